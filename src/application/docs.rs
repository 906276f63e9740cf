//! Request-level orchestration: redirects first, then the cached render.

use std::sync::Arc;

use bytes::Bytes;
use tracing::info;

use super::{
    redirect::{Redirect, RedirectRules, RequestMeta},
    render::{RenderError, RenderOutput, RenderPipeline},
    repo_config::load_repository_config,
};
use crate::{
    cache::{CacheKey, DocumentCache},
    domain::{paths::is_asset, request::ParsedRequest},
};

const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocsResponse {
    Redirect(Redirect),
    Document { body: Bytes, content_type: String },
}

/// Entry point shared by the HTTP surface and the one-shot CLI render.
pub struct DocsService {
    pipeline: RenderPipeline,
    cache: Arc<DocumentCache>,
    rules: RedirectRules,
    tenant_override: Option<String>,
}

impl DocsService {
    pub fn new(
        pipeline: RenderPipeline,
        cache: Arc<DocumentCache>,
        rules: RedirectRules,
        tenant_override: Option<String>,
    ) -> Self {
        Self {
            pipeline,
            cache,
            rules,
            tenant_override,
        }
    }

    pub fn parse(&self, host: &str, path: &str) -> ParsedRequest {
        ParsedRequest::parse(host, path, self.tenant_override.as_deref())
    }

    /// Answer one GET request.
    pub async fn resolve(&self, meta: &RequestMeta<'_>) -> Result<DocsResponse, RenderError> {
        let request = self.parse(meta.host, meta.path());

        if let Some(redirect) = self.rules.canonical(&request, meta) {
            return Ok(self.redirect(&request, redirect));
        }

        let config = load_repository_config(self.pipeline.chain(), &self.cache, &request).await;
        if let Some(redirect) = self.rules.declared(&request, &config) {
            return Ok(self.redirect(&request, redirect));
        }

        let body = self.render(&request).await?;
        Ok(DocsResponse::Document {
            body,
            content_type: content_type_for(&request.document),
        })
    }

    /// Rendered page or asset bytes for `request`, through the cache.
    pub async fn render(&self, request: &ParsedRequest) -> Result<Bytes, RenderError> {
        self.cache
            .read_through(&CacheKey::document(request), || async {
                self.pipeline
                    .render(request)
                    .await
                    .map(RenderOutput::into_bytes)
            })
            .await
    }

    fn redirect(&self, request: &ParsedRequest, redirect: Redirect) -> DocsResponse {
        info!(
            target = "viewdocs::redirect",
            tenant = %request.tenant,
            repository = %request.repository,
            document = %request.document,
            rule = %redirect.rule,
            location = %redirect.location,
            "redirecting request"
        );
        DocsResponse::Redirect(redirect)
    }
}

pub fn content_type_for(document: &str) -> String {
    if is_asset(document) {
        mime_guess::from_path(document)
            .first_or_octet_stream()
            .to_string()
    } else {
        HTML_CONTENT_TYPE.to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::atomic::{AtomicUsize, Ordering},
    };

    use async_trait::async_trait;

    use super::*;
    use crate::{
        application::{
            cascade::FetchChain,
            redirect::RedirectRule,
            source::{MarkupError, MarkupRenderer, RawSource, SourceError, SourceLocation},
        },
        cache::CacheConfig,
    };

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
            Ok(format!("<p>{markup}</p>"))
        }
    }

    fn service(
        files: &[(&'static str, &'static str)],
        cache: CacheConfig,
    ) -> (DocsService, Arc<CountingMarkup>) {
        let markup = Arc::new(CountingMarkup::default());
        let cache = Arc::new(DocumentCache::new(cache));
        let chain = FetchChain::new(
            Arc::new(MapSource(files.iter().copied().collect())),
            "{{CONTENT}}",
        );
        let pipeline =
            RenderPipeline::new(chain, markup.clone(), Arc::clone(&cache), "viewdocs.io");
        let rules = RedirectRules {
            root_target: "http://progrium.viewdocs.io/viewdocs/".to_string(),
            cdn_base: "https://cdn.jsdelivr.net/gh".to_string(),
            legacy_aliases: Vec::new(),
        };
        (DocsService::new(pipeline, cache, rules, None), markup)
    }

    fn get(uri: &str) -> RequestMeta<'_> {
        RequestMeta {
            host: "alice.viewdocs.io",
            uri,
            cache_control: None,
        }
    }

    #[tokio::test]
    async fn second_request_is_served_from_cache() {
        let (docs, markup) = service(&[("docs/guide.md", "hello")], CacheConfig::default());

        let first = docs.resolve(&get("/foo/guide/")).await.expect("first");
        let second = docs.resolve(&get("/foo/guide/")).await.expect("second");

        assert_eq!(first, second);
        assert_eq!(
            first,
            DocsResponse::Document {
                body: Bytes::from_static(b"<p>hello</p>"),
                content_type: HTML_CONTENT_TYPE.to_string(),
            }
        );
        assert_eq!(markup.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn disabled_cache_renders_every_time() {
        let config = CacheConfig {
            enabled: false,
            ..CacheConfig::default()
        };
        let (docs, markup) = service(&[("docs/guide.md", "hello")], config);

        docs.resolve(&get("/foo/guide/")).await.expect("first");
        docs.resolve(&get("/foo/guide/")).await.expect("second");

        assert_eq!(markup.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn canonical_redirect_short_circuits_rendering() {
        let (docs, markup) = service(&[("docs/guide.md", "hello")], CacheConfig::default());

        let response = docs.resolve(&get("/foo/guide.md")).await.expect("redirect");

        assert_eq!(
            response,
            DocsResponse::Redirect(Redirect {
                location: "/foo/guide/".to_string(),
                rule: RedirectRule::Canonical,
            })
        );
        assert_eq!(markup.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn declared_redirect_uses_repository_config() {
        let (docs, markup) = service(
            &[("docs/viewdocs.json", r#"{"redirects": {"old": "new"}}"#)],
            CacheConfig::default(),
        );

        let response = docs.resolve(&get("/foo~dev/old/")).await.expect("redirect");

        assert_eq!(
            response,
            DocsResponse::Redirect(Redirect {
                location: "/foo~dev/new/".to_string(),
                rule: RedirectRule::Declared,
            })
        );
        assert_eq!(markup.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn opted_out_asset_is_served_with_guessed_type() {
        let (docs, _) = service(&[("docs/site.css", "body{}")], CacheConfig::default());
        let meta = RequestMeta {
            host: "alice.viewdocs.io",
            uri: "/foo/site.css",
            cache_control: Some("no-store"),
        };

        let response = docs.resolve(&meta).await.expect("asset");

        assert_eq!(
            response,
            DocsResponse::Document {
                body: Bytes::from_static(b"body{}"),
                content_type: "text/css".to_string(),
            }
        );
    }

    #[test]
    fn content_types_follow_document_kind() {
        assert_eq!(content_type_for("guide"), HTML_CONTENT_TYPE);
        assert_eq!(content_type_for("img/logo.png"), "image/png");
    }
}
