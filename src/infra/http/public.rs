use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    http::{
        HeaderMap, Method, StatusCode, Uri,
        header::{CACHE_CONTROL, CONTENT_TYPE, HOST, LOCATION},
    },
    middleware,
    response::{IntoResponse, Response},
    routing::get,
};

use super::middleware::{log_responses, set_request_context};
use crate::application::{
    docs::{DocsResponse, DocsService},
    error::{AppError, HttpError},
    redirect::RequestMeta,
};

#[derive(Clone)]
pub struct HttpState {
    pub docs: Arc<DocsService>,
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/favicon.ico", get(favicon))
        .fallback(serve_docs)
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

async fn favicon() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn serve_docs(
    State(state): State<HttpState>,
    method: Method,
    headers: HeaderMap,
    uri: Uri,
) -> Response {
    if method != Method::GET {
        return HttpError::new(
            "infra::http::public::serve_docs",
            StatusCode::METHOD_NOT_ALLOWED,
            "Method not allowed",
            format!("{method} is not supported"),
        )
        .into_response();
    }

    let host = headers
        .get(HOST)
        .and_then(|value| value.to_str().ok())
        .or_else(|| uri.host())
        .unwrap_or_default();
    let meta = RequestMeta {
        host,
        uri: uri.path_and_query().map_or("/", |pq| pq.as_str()),
        cache_control: headers
            .get(CACHE_CONTROL)
            .and_then(|value| value.to_str().ok()),
    };

    match state.docs.resolve(&meta).await {
        Ok(DocsResponse::Redirect(redirect)) => (
            StatusCode::MOVED_PERMANENTLY,
            [(LOCATION, redirect.location)],
        )
            .into_response(),
        Ok(DocsResponse::Document { body, content_type }) => {
            ([(CONTENT_TYPE, content_type)], body).into_response()
        }
        Err(err) => AppError::from(err).into_response(),
    }
}
