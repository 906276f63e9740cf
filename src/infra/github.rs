//! reqwest adapters for the raw-content origin and the markdown service.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, StatusCode, Url, header};
use tracing::{debug, info};

use super::error::InfraError;
use crate::application::source::{
    MarkupError, MarkupRenderer, RawSource, SourceError, SourceLocation,
};

const MARKDOWN_CONTENT_TYPE: &str = "text/x-markdown";
const ERROR_BODY_EXCERPT: usize = 512;

pub fn user_agent() -> &'static str {
    concat!("viewdocs/", env!("CARGO_PKG_VERSION"))
}

/// Shared client for every upstream call; `timeout` bounds each request.
pub fn build_client(timeout: Duration) -> Result<Client, InfraError> {
    Client::builder()
        .user_agent(user_agent())
        .connect_timeout(timeout)
        .timeout(timeout)
        .build()
        .map_err(|err| InfraError::http_client(err.to_string()))
}

/// Raw files at `{origin}/{tenant}/{repository}/{reference}/{path}`.
#[derive(Debug, Clone)]
pub struct GitHubRawSource {
    client: Client,
    origin: String,
}

impl GitHubRawSource {
    pub fn new(client: Client, origin: &Url) -> Self {
        Self {
            client,
            origin: origin.as_str().trim_end_matches('/').to_string(),
        }
    }

    pub fn url_for(&self, location: &SourceLocation, path: &str) -> String {
        format!(
            "{}/{}/{}/{}/{}",
            self.origin, location.tenant, location.repository, location.reference, path
        )
    }
}

#[async_trait]
impl RawSource for GitHubRawSource {
    async fn fetch(
        &self,
        location: &SourceLocation,
        path: &str,
    ) -> Result<Option<Bytes>, SourceError> {
        let url = self.url_for(location, path);
        info!(target = "viewdocs::fetch", url = %url, "fetching raw file");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|err| SourceError::transport(path, err))?;
        let status = response.status();

        if status.is_success() {
            let body = response
                .bytes()
                .await
                .map_err(|err| SourceError::transport(path, err))?;
            return Ok(Some(body));
        }
        if status.is_client_error() {
            debug!(
                target = "viewdocs::fetch",
                url = %url,
                status = status.as_u16(),
                "raw file not found"
            );
            return Ok(None);
        }
        Err(SourceError::Upstream {
            path: path.to_string(),
            status: status.as_u16(),
        })
    }
}

/// Markdown-to-HTML through the hosted rendering endpoint.
#[derive(Clone)]
pub struct GitHubMarkdownRenderer {
    client: Client,
    endpoint: Url,
    token: String,
}

impl GitHubMarkdownRenderer {
    pub fn new(client: Client, endpoint: Url, token: impl Into<String>) -> Self {
        Self {
            client,
            endpoint,
            token: token.into(),
        }
    }
}

#[async_trait]
impl MarkupRenderer for GitHubMarkdownRenderer {
    async fn render(&self, markup: &str) -> Result<String, MarkupError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .header(header::CONTENT_TYPE, MARKDOWN_CONTENT_TYPE)
            .header(header::AUTHORIZATION, format!("token {}", self.token))
            .body(markup.to_string())
            .send()
            .await
            .map_err(|err| MarkupError::Transport(err.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| MarkupError::Transport(err.to_string()))?;
        if !status.is_success() {
            return Err(MarkupError::Rejected {
                status: status.as_u16(),
                body: excerpt(&body),
            });
        }
        Ok(body)
    }
}

/// Fetch the built-in default template. Called once at startup.
pub async fn fetch_default_template(client: &Client, url: &Url) -> Result<String, InfraError> {
    let failure = |message: String| InfraError::DefaultTemplate {
        url: url.to_string(),
        message,
    };

    let response = client
        .get(url.clone())
        .send()
        .await
        .map_err(|err| failure(err.to_string()))?;
    let status = response.status();
    if status != StatusCode::OK {
        return Err(failure(format!("status {status}")));
    }
    response.text().await.map_err(|err| failure(err.to_string()))
}

fn excerpt(body: &str) -> String {
    match body.char_indices().nth(ERROR_BODY_EXCERPT) {
        Some((idx, _)) => format!("{}…", &body[..idx]),
        None => body.to_string(),
    }
}
