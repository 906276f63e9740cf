//! Concurrent template retrieval and placeholder substitution.

use std::{future::Future, sync::Arc};

use tokio::task::JoinHandle;
use tracing::warn;

use super::types::PageContext;

const CONTENT: &str = "{{CONTENT}}";
const NAME: &str = "{{NAME}}";
const USER: &str = "{{USER}}";
const PAGE_CLASS: &str = "{{PAGE_CLASS}}";
const REF: &str = "{{REF}}";
const DOC: &str = "{{DOC}}";

/// In-flight template fetch, joined once at substitution time.
///
/// Dropping the guard without joining aborts the task, so early exits of the
/// pipeline never leave a fetch running in the background.
pub struct TemplateFetch {
    handle: Option<JoinHandle<String>>,
    fallback: Arc<str>,
}

impl TemplateFetch {
    /// Start `fetch` on the runtime. `fallback` is used if the task dies.
    pub fn spawn<F>(fetch: F, fallback: Arc<str>) -> Self
    where
        F: Future<Output = String> + Send + 'static,
    {
        Self {
            handle: Some(tokio::spawn(fetch)),
            fallback,
        }
    }

    pub async fn join(mut self) -> String {
        let Some(handle) = self.handle.take() else {
            return self.fallback.to_string();
        };
        match handle.await {
            Ok(template) => template,
            Err(err) => {
                warn!(
                    target = "viewdocs::render",
                    error = %err,
                    "template task failed, using default template"
                );
                self.fallback.to_string()
            }
        }
    }

    #[cfg(test)]
    fn abort_handle(&self) -> Option<tokio::task::AbortHandle> {
        self.handle.as_ref().map(JoinHandle::abort_handle)
    }
}

impl Drop for TemplateFetch {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// Fill the template placeholders. `{{CONTENT}}` is replaced once, before the
/// metadata placeholders, which are replaced everywhere.
pub fn substitute(template: &str, content: &str, context: &PageContext) -> String {
    template
        .replacen(CONTENT, content, 1)
        .replace(NAME, &context.repository)
        .replace(USER, &context.tenant)
        .replace(PAGE_CLASS, &context.page_class)
        .replace(REF, &context.reference)
        .replace(DOC, &context.document)
}
