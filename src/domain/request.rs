use super::paths::{DEFAULT_REFERENCE, INDEX_DOCUMENT, repository_prefix};

/// Tenant, repository, reference and document derived from one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRequest {
    pub tenant: String,
    pub repository: String,
    pub reference: String,
    pub document: String,
}

impl ParsedRequest {
    /// Parse the `Host` header and request path.
    ///
    /// Total: malformed input degrades to empty components instead of failing.
    /// `tenant_override` replaces the tenant derived from the first host label.
    pub fn parse(host: &str, path: &str, tenant_override: Option<&str>) -> Self {
        let tenant = match tenant_override {
            Some(tenant) if !tenant.is_empty() => tenant.to_string(),
            _ => host.split('.').next().unwrap_or_default().to_string(),
        };

        let segments: Vec<&str> = path.split('/').collect();
        let repo_and_ref = segments.get(1).copied().unwrap_or_default();
        let (repository, reference) = match repo_and_ref.split_once('~') {
            Some((repository, reference)) => (repository, reference),
            None => (repo_and_ref, DEFAULT_REFERENCE),
        };

        let document = if segments.len() < 3 || (segments.len() == 3 && path.ends_with('/')) {
            INDEX_DOCUMENT.to_string()
        } else {
            let joined = segments[2..].join("/");
            match joined.strip_suffix('/') {
                Some(trimmed) => trimmed.to_string(),
                None => joined,
            }
        };

        Self {
            tenant,
            repository: repository.to_string(),
            reference: reference.to_string(),
            document,
        }
    }

    pub fn is_index(&self) -> bool {
        self.document == INDEX_DOCUMENT
    }

    /// Path segment used when linking back into this repository.
    pub fn repository_prefix(&self) -> String {
        repository_prefix(&self.repository, &self.reference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tenant_comes_from_first_host_label() {
        let parsed = ParsedRequest::parse("progrium.viewdocs.io", "/viewdocs/", None);
        assert_eq!(parsed.tenant, "progrium");
        assert_eq!(parsed.repository, "viewdocs");
        assert_eq!(parsed.reference, DEFAULT_REFERENCE);
        assert_eq!(parsed.document, INDEX_DOCUMENT);
    }

    #[test]
    fn tenant_override_wins_over_host() {
        let parsed = ParsedRequest::parse("localhost:8888", "/viewdocs/", Some("progrium"));
        assert_eq!(parsed.tenant, "progrium");
    }

    #[test]
    fn empty_override_is_ignored() {
        let parsed = ParsedRequest::parse("alice.viewdocs.io", "/repo/", Some(""));
        assert_eq!(parsed.tenant, "alice");
    }

    #[test]
    fn reference_suffix_is_split_from_repository() {
        let parsed = ParsedRequest::parse("alice.viewdocs.io", "/repo~dev/guide/", None);
        assert_eq!(parsed.repository, "repo");
        assert_eq!(parsed.reference, "dev");
        assert_eq!(parsed.document, "guide");
        assert_eq!(parsed.repository_prefix(), "repo~dev");
    }

    #[test]
    fn missing_reference_defaults_for_every_shape() {
        for path in ["/repo", "/repo/", "/repo/a", "/repo/a/b/", "/", ""] {
            let parsed = ParsedRequest::parse("alice.viewdocs.io", path, None);
            assert_eq!(parsed.reference, DEFAULT_REFERENCE, "path {path:?}");
        }
    }

    #[test]
    fn short_paths_resolve_to_index() {
        for path in ["/repo", "/repo/", "/", ""] {
            let parsed = ParsedRequest::parse("alice.viewdocs.io", path, None);
            assert_eq!(parsed.document, INDEX_DOCUMENT, "path {path:?}");
            assert!(parsed.is_index());
        }
    }

    #[test]
    fn trailing_slash_is_stripped_from_nested_documents() {
        for (path, expected) in [
            ("/repo/a/", "a"),
            ("/repo/a/b/", "a/b"),
            ("/repo/a/b", "a/b"),
            ("/repo/guide.md", "guide.md"),
        ] {
            let parsed = ParsedRequest::parse("alice.viewdocs.io", path, None);
            assert_eq!(parsed.document, expected, "path {path:?}");
        }
    }

    #[test]
    fn empty_host_degrades_to_empty_tenant() {
        let parsed = ParsedRequest::parse("", "/repo/", None);
        assert_eq!(parsed.tenant, "");
        assert_eq!(parsed.repository, "repo");
    }
}
