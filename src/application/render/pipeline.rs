use std::{convert::Infallible, sync::Arc, time::Instant};

use bytes::Bytes;
use metrics::histogram;
use tracing::{debug, info};

use super::{
    links::{LinkScope, rewrite_links},
    template::{TemplateFetch, substitute},
    types::{PageContext, RenderError, RenderOutput},
};
use crate::{
    application::{
        cascade::{FetchChain, cleanup_doc_links},
        source::{MarkupRenderer, SourceLocation},
    },
    cache::{CacheKey, DocumentCache},
    domain::{
        frontmatter::split_frontmatter,
        paths::{DOCS_ROOT, INDEX_DOCUMENT, is_asset, page_class, with_markup_extension},
        request::ParsedRequest,
    },
};

pub(crate) const METRIC_RENDER_MS: &str = "viewdocs_render_ms";

/// Turns a parsed request into a finished page or asset body.
///
/// The template is fetched on its own task as soon as its name is known and
/// joined only at substitution, overlapping the markup service round trip.
#[derive(Clone)]
pub struct RenderPipeline {
    chain: FetchChain,
    markup: Arc<dyn MarkupRenderer>,
    cache: Arc<DocumentCache>,
    hostname: String,
}

impl RenderPipeline {
    pub fn new(
        chain: FetchChain,
        markup: Arc<dyn MarkupRenderer>,
        cache: Arc<DocumentCache>,
        hostname: impl Into<String>,
    ) -> Self {
        Self {
            chain,
            markup,
            cache,
            hostname: hostname.into(),
        }
    }

    pub fn chain(&self) -> &FetchChain {
        &self.chain
    }

    pub async fn render(&self, request: &ParsedRequest) -> Result<RenderOutput, RenderError> {
        let started = Instant::now();
        let location = SourceLocation::from(request);

        if is_asset(&request.document) {
            let fetched = self
                .chain
                .fetch_document(&location, &format!("{DOCS_ROOT}{}", request.document))
                .await?;
            return Ok(RenderOutput::Asset(fetched.body));
        }

        let document = with_markup_extension(&request.document);
        let fetched = self
            .chain
            .fetch_document(&location, &format!("{DOCS_ROOT}{document}"))
            .await?;
        let source = String::from_utf8_lossy(&fetched.body);
        let (frontmatter, body) = split_frontmatter(&source);
        let template_name = frontmatter
            .unwrap_or_default()
            .template_or_default(document == INDEX_DOCUMENT);

        let template = self.spawn_template(request, &location, template_name);

        let markup = cleanup_doc_links(body);
        let content = self.markup.render(&markup).await?;

        let context = PageContext {
            tenant: request.tenant.clone(),
            repository: request.repository.clone(),
            reference: request.reference.clone(),
            page_class: page_class(&document),
            document,
        };
        let page = substitute(&template.join().await, &content, &context);

        let repository_prefix = request.repository_prefix();
        let html = rewrite_links(
            &page,
            &LinkScope {
                tenant: &request.tenant,
                repository: &request.repository,
                repository_prefix: &repository_prefix,
                hostname: &self.hostname,
            },
        )?;

        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        histogram!(METRIC_RENDER_MS).record(elapsed_ms);
        info!(
            target = "viewdocs::render",
            location = %location,
            document = %context.document,
            source_path = %fetched.path,
            found = fetched.found,
            elapsed_ms,
            "document rendered"
        );
        Ok(RenderOutput::Page(html))
    }

    fn spawn_template(
        &self,
        request: &ParsedRequest,
        location: &SourceLocation,
        name: String,
    ) -> TemplateFetch {
        let key = CacheKey::template(request, &name);
        let cache = Arc::clone(&self.cache);
        let chain = self.chain.clone();
        let location = location.clone();
        debug!(
            target = "viewdocs::render",
            location = %location,
            template = %name,
            "dispatching template fetch"
        );

        TemplateFetch::spawn(
            async move {
                let Ok(bytes) = cache
                    .read_through(&key, || async {
                        let template = chain.fetch_template(&location, &name).await;
                        Ok::<_, Infallible>(Bytes::from(template))
                    })
                    .await;
                String::from_utf8_lossy(&bytes).into_owned()
            },
            Arc::from(self.chain.default_template()),
        )
    }
}
