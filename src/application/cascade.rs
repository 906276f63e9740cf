//! Ordered fetch cascades for documents and templates.
//!
//! Each logical resource maps to an explicit list of [`Candidate`]s tried in
//! order; the first hit ends the walk. Not-found answers move on to the next
//! candidate. Remote transport errors abort document lookups and are absorbed
//! for templates, which always end on the configured default.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, warn};

use super::source::{RawSource, SourceError, SourceLocation};
use crate::domain::{
    frontmatter::DEFAULT_TEMPLATE,
    paths::{DOCS_ROOT, INDEX_DOCUMENT, MARKDOWN_EXTENSIONS},
};

/// Body synthesised when no candidate produced a document.
pub const PAGE_NOT_FOUND: &str = "# Page not found";

const README_STEM: &str = "README";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Working-tree override, consulted only in development mode.
    Local,
    Remote,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub origin: Origin,
    pub path: String,
}

impl Candidate {
    fn local(path: impl Into<String>) -> Self {
        Self {
            origin: Origin::Local,
            path: path.into(),
        }
    }

    fn remote(path: impl Into<String>) -> Self {
        Self {
            origin: Origin::Remote,
            path: path.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedDocument {
    /// Candidate path that answered, or the requested path when none did.
    pub path: String,
    pub body: Bytes,
    /// False when `body` is the synthesised not-found placeholder.
    pub found: bool,
}

#[derive(Clone)]
pub struct FetchChain {
    remote: Arc<dyn RawSource>,
    local: Option<Arc<dyn RawSource>>,
    default_template: Arc<str>,
}

impl FetchChain {
    pub fn new(remote: Arc<dyn RawSource>, default_template: impl Into<Arc<str>>) -> Self {
        Self {
            remote,
            local: None,
            default_template: default_template.into(),
        }
    }

    /// Consult `local` ahead of the remote source (development mode).
    pub fn with_local_override(mut self, local: Arc<dyn RawSource>) -> Self {
        self.local = Some(local);
        self
    }

    pub fn default_template(&self) -> &str {
        &self.default_template
    }

    /// Candidates for `path`, e.g. `docs/index.md`, in the order they are tried.
    ///
    /// Under the docs root, a miss falls back to the same path at the
    /// repository root; the index document first probes README variants.
    pub fn document_candidates(&self, path: &str) -> Vec<Candidate> {
        let mut candidates = Vec::new();
        if self.local.is_some() {
            candidates.push(Candidate::local(path));
        }
        candidates.push(Candidate::remote(path));

        if let Some(relative) = path.strip_prefix(DOCS_ROOT) {
            if relative == INDEX_DOCUMENT {
                candidates.extend(
                    MARKDOWN_EXTENSIONS
                        .iter()
                        .map(|ext| Candidate::remote(format!("{README_STEM}{ext}"))),
                );
            }
            candidates.push(Candidate::remote(relative));
        }
        candidates
    }

    pub fn template_candidates(&self, name: &str) -> Vec<Candidate> {
        let named = format!("{DOCS_ROOT}{name}.html");
        let shared = format!("{DOCS_ROOT}{DEFAULT_TEMPLATE}.html");
        let fallback = name != DEFAULT_TEMPLATE;

        let mut candidates = Vec::new();
        if self.local.is_some() {
            candidates.push(Candidate::local(named.clone()));
            if fallback {
                candidates.push(Candidate::local(shared.clone()));
            }
        }
        candidates.push(Candidate::remote(named));
        if fallback {
            candidates.push(Candidate::remote(shared));
        }
        candidates
    }

    /// Resolve a document through its cascade.
    ///
    /// Exhausting every candidate yields [`PAGE_NOT_FOUND`] with `found = false`.
    pub async fn fetch_document(
        &self,
        location: &SourceLocation,
        path: &str,
    ) -> Result<FetchedDocument, SourceError> {
        for candidate in self.document_candidates(path) {
            match self.attempt(location, &candidate).await {
                Ok(Some(body)) => {
                    return Ok(FetchedDocument {
                        path: candidate.path,
                        body,
                        found: true,
                    });
                }
                Ok(None) => continue,
                Err(err) if candidate.origin == Origin::Local => {
                    warn!(
                        target = "viewdocs::fetch",
                        location = %location,
                        path = %candidate.path,
                        error = %err,
                        "local override unreadable, trying next candidate"
                    );
                }
                Err(err) => return Err(err),
            }
        }

        debug!(
            target = "viewdocs::fetch",
            location = %location,
            path,
            "document cascade exhausted"
        );
        Ok(FetchedDocument {
            path: path.to_string(),
            body: Bytes::from_static(PAGE_NOT_FOUND.as_bytes()),
            found: false,
        })
    }

    /// Resolve template `name`. Never fails: the default template closes the chain.
    pub async fn fetch_template(&self, location: &SourceLocation, name: &str) -> String {
        for candidate in self.template_candidates(name) {
            match self.attempt(location, &candidate).await {
                Ok(Some(body)) => return String::from_utf8_lossy(&body).into_owned(),
                Ok(None) => continue,
                Err(err) => {
                    warn!(
                        target = "viewdocs::fetch",
                        location = %location,
                        path = %candidate.path,
                        error = %err,
                        "template candidate failed, trying next"
                    );
                }
            }
        }

        debug!(
            target = "viewdocs::fetch",
            location = %location,
            template = name,
            "using default template"
        );
        self.default_template.to_string()
    }

    /// Fetch a single file without any fallback paths; the local override
    /// still wins in development mode.
    pub async fn fetch_file(
        &self,
        location: &SourceLocation,
        path: &str,
    ) -> Result<Option<Bytes>, SourceError> {
        if self.local.is_some() {
            match self.attempt(location, &Candidate::local(path)).await {
                Ok(Some(body)) => return Ok(Some(body)),
                Ok(None) => {}
                Err(err) => warn!(
                    target = "viewdocs::fetch",
                    location = %location,
                    path,
                    error = %err,
                    "local override unreadable, trying remote"
                ),
            }
        }
        self.attempt(location, &Candidate::remote(path)).await
    }

    async fn attempt(
        &self,
        location: &SourceLocation,
        candidate: &Candidate,
    ) -> Result<Option<Bytes>, SourceError> {
        let source = match (candidate.origin, &self.local) {
            (Origin::Local, Some(local)) => local,
            _ => &self.remote,
        };
        debug!(
            target = "viewdocs::fetch",
            location = %location,
            path = %candidate.path,
            origin = ?candidate.origin,
            "fetching candidate"
        );
        source.fetch(location, &candidate.path).await
    }
}

/// Rebind intra-repository markdown links to the routing scheme: drop the
/// docs root from link targets and turn `.md` targets into directory paths.
pub fn cleanup_doc_links(body: &str) -> String {
    body.replace("](docs/", "](")
        .replace("](/docs/", "](")
        .replace(".md)", "/)")
        .replace(".md#", "/#")
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, sync::Mutex};

    use async_trait::async_trait;

    use super::*;

    #[derive(Default)]
    struct FakeSource {
        files: HashMap<String, &'static str>,
        failing: Vec<String>,
        requests: Mutex<Vec<String>>,
    }

    impl FakeSource {
        fn with(files: &[(&str, &'static str)]) -> Self {
            Self {
                files: files
                    .iter()
                    .map(|(path, body)| (path.to_string(), *body))
                    .collect(),
                ..Self::default()
            }
        }

        fn failing(mut self, path: &str) -> Self {
            self.failing.push(path.to_string());
            self
        }

        fn requests(&self) -> Vec<String> {
            self.requests.lock().expect("requests lock").clone()
        }
    }

    #[async_trait]
    impl RawSource for FakeSource {
        async fn fetch(
            &self,
            _location: &SourceLocation,
            path: &str,
        ) -> Result<Option<Bytes>, SourceError> {
            self.requests
                .lock()
                .expect("requests lock")
                .push(path.to_string());
            if self.failing.iter().any(|failing| failing == path) {
                return Err(SourceError::transport(path, "connection reset"));
            }
            Ok(self
                .files
                .get(path)
                .map(|body| Bytes::from_static(body.as_bytes())))
        }
    }

    fn location() -> SourceLocation {
        SourceLocation::new("alice", "repo", "master")
    }

    #[tokio::test]
    async fn primary_path_wins_when_present() {
        let remote = Arc::new(FakeSource::with(&[("docs/guide.md", "# Guide")]));
        let chain = FetchChain::new(remote.clone(), "DEFAULT");

        let fetched = chain
            .fetch_document(&location(), "docs/guide.md")
            .await
            .expect("fetched");

        assert!(fetched.found);
        assert_eq!(fetched.path, "docs/guide.md");
        assert_eq!(fetched.body, Bytes::from_static(b"# Guide"));
        assert_eq!(remote.requests(), vec!["docs/guide.md"]);
    }

    #[tokio::test]
    async fn index_probes_readme_variants_in_order() {
        let remote = Arc::new(FakeSource::with(&[
            ("README.mkdn", "# Mkdn readme"),
            ("README.mdwn", "# Mdwn readme"),
        ]));
        let chain = FetchChain::new(remote.clone(), "DEFAULT");

        let fetched = chain
            .fetch_document(&location(), "docs/index.md")
            .await
            .expect("fetched");

        assert_eq!(fetched.path, "README.mkdn");
        assert_eq!(fetched.body, Bytes::from_static(b"# Mkdn readme"));
        assert_eq!(
            remote.requests(),
            vec![
                "docs/index.md",
                "README.md",
                "README.markdown",
                "README.mdown",
                "README.mkdn",
            ]
        );
    }

    #[tokio::test]
    async fn docs_miss_falls_back_to_repository_root() {
        let remote = Arc::new(FakeSource::with(&[("guide.md", "# Root guide")]));
        let chain = FetchChain::new(remote.clone(), "DEFAULT");

        let fetched = chain
            .fetch_document(&location(), "docs/guide.md")
            .await
            .expect("fetched");

        assert_eq!(fetched.path, "guide.md");
        assert_eq!(remote.requests(), vec!["docs/guide.md", "guide.md"]);
    }

    #[tokio::test]
    async fn exhausted_cascade_synthesises_placeholder() {
        let remote = Arc::new(FakeSource::default());
        let chain = FetchChain::new(remote, "DEFAULT");

        let fetched = chain
            .fetch_document(&location(), "docs/missing.md")
            .await
            .expect("placeholder");

        assert!(!fetched.found);
        assert_eq!(fetched.body, Bytes::from_static(PAGE_NOT_FOUND.as_bytes()));
    }

    #[tokio::test]
    async fn remote_transport_error_propagates() {
        let remote = Arc::new(FakeSource::default().failing("guide.md"));
        let chain = FetchChain::new(remote, "DEFAULT");

        let result = chain.fetch_document(&location(), "docs/guide.md").await;

        assert!(matches!(result, Err(SourceError::Transport { .. })));
    }

    #[tokio::test]
    async fn local_override_is_tried_first() {
        let remote = Arc::new(FakeSource::with(&[("docs/guide.md", "remote")]));
        let local = Arc::new(FakeSource::with(&[("docs/guide.md", "local")]));
        let chain = FetchChain::new(remote.clone(), "DEFAULT").with_local_override(local);

        let fetched = chain
            .fetch_document(&location(), "docs/guide.md")
            .await
            .expect("fetched");

        assert_eq!(fetched.body, Bytes::from_static(b"local"));
        assert!(remote.requests().is_empty());
    }

    #[tokio::test]
    async fn unreadable_local_override_falls_through() {
        let remote = Arc::new(FakeSource::with(&[("docs/guide.md", "remote")]));
        let local = Arc::new(FakeSource::default().failing("docs/guide.md"));
        let chain = FetchChain::new(remote, "DEFAULT").with_local_override(local);

        let fetched = chain
            .fetch_document(&location(), "docs/guide.md")
            .await
            .expect("fetched");

        assert_eq!(fetched.body, Bytes::from_static(b"remote"));
    }

    #[tokio::test]
    async fn named_template_falls_back_to_shared_then_default() {
        let remote = Arc::new(FakeSource::with(&[("docs/template.html", "shared")]));
        let chain = FetchChain::new(remote.clone(), "DEFAULT");

        assert_eq!(chain.fetch_template(&location(), "home").await, "shared");
        assert_eq!(
            remote.requests(),
            vec!["docs/home.html", "docs/template.html"]
        );

        let empty = FetchChain::new(Arc::new(FakeSource::default()), "DEFAULT");
        assert_eq!(empty.fetch_template(&location(), "home").await, "DEFAULT");
    }

    #[tokio::test]
    async fn shared_template_is_not_probed_twice() {
        let remote = Arc::new(FakeSource::default());
        let chain = FetchChain::new(remote.clone(), "DEFAULT");

        assert_eq!(chain.fetch_template(&location(), "template").await, "DEFAULT");
        assert_eq!(remote.requests(), vec!["docs/template.html"]);
    }

    #[tokio::test]
    async fn template_errors_are_absorbed() {
        let remote = Arc::new(FakeSource::default().failing("docs/wide.html"));
        let chain = FetchChain::new(remote, "DEFAULT");

        assert_eq!(chain.fetch_template(&location(), "wide").await, "DEFAULT");
    }

    #[test]
    fn template_candidates_include_local_overrides_in_dev_mode() {
        let chain = FetchChain::new(Arc::new(FakeSource::default()), "DEFAULT")
            .with_local_override(Arc::new(FakeSource::default()));

        let origins: Vec<(Origin, String)> = chain
            .template_candidates("home")
            .into_iter()
            .map(|candidate| (candidate.origin, candidate.path))
            .collect();

        assert_eq!(
            origins,
            vec![
                (Origin::Local, "docs/home.html".to_string()),
                (Origin::Local, "docs/template.html".to_string()),
                (Origin::Remote, "docs/home.html".to_string()),
                (Origin::Remote, "docs/template.html".to_string()),
            ]
        );
    }

    #[test]
    fn cleanup_rewrites_repository_links() {
        let body = "[a](docs/setup.md) [b](/docs/usage.md#flags) [c](https://x.io/y.md)";
        assert_eq!(
            cleanup_doc_links(body),
            "[a](setup/) [b](usage/#flags) [c](https://x.io/y/)"
        );
    }
}
