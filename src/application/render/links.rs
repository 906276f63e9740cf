//! Rebinds anchors in rendered pages to the `/{repository}[~{reference}]/` routing scheme.

use lol_html::{RewriteStrSettings, element, rewrite_str};

use super::types::RenderError;

/// Per-render inputs of the link rewriter.
#[derive(Debug, Clone)]
pub struct LinkScope<'a> {
    pub tenant: &'a str,
    pub repository: &'a str,
    /// `repository` or `repository~reference`.
    pub repository_prefix: &'a str,
    /// Public hostname; `http://{tenant}.{hostname}` counts as same-tenant.
    pub hostname: &'a str,
}

impl LinkScope<'_> {
    /// Rewrite a single `href` value.
    pub fn rewrite_href(&self, href: &str) -> String {
        let same_tenant = format!("http://{}.{}", self.tenant, self.hostname);
        let target = href.strip_prefix(same_tenant.as_str()).unwrap_or(href);

        let repository_root = format!("/{}/", self.repository);
        if let Some(rest) = target.strip_prefix(repository_root.as_str()) {
            return format!("/{}/{rest}", self.repository_prefix);
        }

        if is_left_untouched(target) {
            return target.to_string();
        }
        format!("/{}/{target}", self.repository_prefix)
    }
}

fn is_left_untouched(target: &str) -> bool {
    if target.is_empty() || target.starts_with('#') {
        return true;
    }
    let first_slash = target.find('/');
    if first_slash == Some(0) {
        return true;
    }
    // A colon with no slash after it still marks a scheme (`mailto:`).
    let scheme_bound = first_slash.unwrap_or(target.len());
    if target.find(':').is_some_and(|colon| colon < scheme_bound) {
        return true;
    }
    match (target.find('#'), first_slash) {
        (Some(hash), Some(slash)) => hash < slash,
        _ => false,
    }
}

/// Rewrite every anchor `href` in `html`.
///
/// Idempotence is not guaranteed; run it exactly once per rendered page.
pub fn rewrite_links(html: &str, scope: &LinkScope<'_>) -> Result<String, RenderError> {
    rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![element!("a[href]", |el| {
                if let Some(href) = el.get_attribute("href") {
                    let rewritten = scope.rewrite_href(&href);
                    if rewritten != href {
                        el.set_attribute("href", &rewritten)?;
                    }
                }
                Ok(())
            })],
            ..RewriteStrSettings::default()
        },
    )
    .map_err(|err| RenderError::Links {
        message: err.to_string(),
    })
}
