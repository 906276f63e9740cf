use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use bytes::Bytes;
use tower::ServiceExt;
use viewdocs::application::cascade::FetchChain;
use viewdocs::application::docs::DocsService;
use viewdocs::application::redirect::RedirectRules;
use viewdocs::application::render::RenderPipeline;
use viewdocs::application::source::{
    MarkupError, MarkupRenderer, RawSource, SourceError, SourceLocation,
};
use viewdocs::cache::{CacheConfig, DocumentCache};
use viewdocs::infra::http::{HttpState, build_router};

const TEMPLATE: &str = "<html><title>{{NAME}}</title><body>{{CONTENT}}</body></html>";

struct MapSource(HashMap<&'static str, &'static str>);

#[async_trait]
impl RawSource for MapSource {
    async fn fetch(
        &self,
        _location: &SourceLocation,
        path: &str,
    ) -> Result<Option<Bytes>, SourceError> {
        Ok(self
            .0
            .get(path)
            .map(|body| Bytes::from_static(body.as_bytes())))
    }
}

#[derive(Default)]
struct CountingMarkup {
    calls: AtomicUsize,
}

#[async_trait]
impl MarkupRenderer for CountingMarkup {
    async fn render(&self, markup: &str) -> Result<String, MarkupError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("<p>{}</p><a href=\"install/\">Install</a>", markup.trim()))
    }
}

struct FailingMarkup;

#[async_trait]
impl MarkupRenderer for FailingMarkup {
    async fn render(&self, _markup: &str) -> Result<String, MarkupError> {
        Err(MarkupError::Rejected {
            status: 401,
            body: "Bad credentials".to_string(),
        })
    }
}

fn app_with(markup: Arc<dyn MarkupRenderer>) -> Router {
    let files = HashMap::from([
        ("docs/index.md", "# Welcome"),
        ("docs/guide.md", "Guide body"),
        ("docs/logo.png", "png"),
        ("docs/viewdocs.json", r#"{"redirects": {"old-guide": "guide"}}"#),
    ]);
    let cache = Arc::new(DocumentCache::new(CacheConfig::default()));
    let chain = FetchChain::new(Arc::new(MapSource(files)), TEMPLATE);
    let pipeline = RenderPipeline::new(chain, markup, Arc::clone(&cache), "viewdocs.io");
    let rules = RedirectRules {
        root_target: "http://progrium.viewdocs.io/viewdocs/".to_string(),
        cdn_base: "https://cdn.jsdelivr.net/gh".to_string(),
        legacy_aliases: Vec::new(),
    };
    let docs = DocsService::new(pipeline, cache, rules, None);
    build_router(HttpState {
        docs: Arc::new(docs),
    })
}

fn app() -> (Router, Arc<CountingMarkup>) {
    let markup = Arc::new(CountingMarkup::default());
    (app_with(markup.clone()), markup)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .header(header::HOST, "alice.viewdocs.io")
        .body(Body::empty())
        .expect("request should build")
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should read");
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

#[tokio::test]
async fn renders_document_into_template() {
    let (app, _) = app();

    let response = app.oneshot(get("/foo/guide/")).await.expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/html; charset=utf-8"
    );
    assert!(response.headers().contains_key("x-request-id"));
    let body = body_text(response).await;
    assert!(body.contains("<title>foo</title>"), "{body}");
    assert!(body.contains("<p>Guide body</p>"), "{body}");
    assert!(body.contains(r#"href="/foo/install/""#), "{body}");
}

#[tokio::test]
async fn second_request_is_served_from_cache() {
    let (app, markup) = app();

    for _ in 0..2 {
        let response = app.clone().oneshot(get("/foo/guide/")).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);
    }

    assert_eq!(markup.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn non_canonical_paths_redirect_permanently() {
    let (app, markup) = app();

    let response = app.oneshot(get("/foo/guide.md")).await.expect("response");

    assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "/foo/guide/"
    );
    assert_eq!(markup.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn repository_redirects_are_applied() {
    let (app, _) = app();

    let response = app.oneshot(get("/foo/old-guide/")).await.expect("response");

    assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "/foo/guide/"
    );
}

#[tokio::test]
async fn root_redirects_to_project_site() {
    let (app, _) = app();

    let response = app.oneshot(get("/")).await.expect("response");

    assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "http://progrium.viewdocs.io/viewdocs/"
    );
}

#[tokio::test]
async fn assets_redirect_to_cdn() {
    let (app, _) = app();

    let response = app.oneshot(get("/foo/logo.png")).await.expect("response");

    assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "https://cdn.jsdelivr.net/gh/alice/foo@master/docs/logo.png"
    );
}

#[tokio::test]
async fn favicon_is_empty() {
    let (app, _) = app();

    let response = app.oneshot(get("/favicon.ico")).await.expect("response");

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn non_get_methods_are_rejected() {
    let (app, _) = app();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/foo/guide/")
        .header(header::HOST, "alice.viewdocs.io")
        .body(Body::empty())
        .expect("request should build");

    let response = app.oneshot(request).await.expect("response");

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn render_failures_surface_as_server_errors() {
    let app = app_with(Arc::new(FailingMarkup));

    let response = app.oneshot(get("/foo/guide/")).await.expect("response");

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_text(response).await;
    assert!(body.contains("Bad credentials"), "{body}");
}
