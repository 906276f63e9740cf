//! Redirect decisions taken before a request reaches the render pipeline.
//!
//! Rules are checked in a fixed order and the first match wins:
//! root, legacy aliases, CDN offload, path canonicalization, and finally the
//! repository-declared redirect map. The first four only look at the request;
//! the last one needs the repository config, which callers load lazily.

use std::fmt;

use super::repo_config::RepositoryConfig;
use crate::domain::{
    paths::{DOCS_ROOT, MARKDOWN_EXTENSIONS, extension, is_asset},
    request::ParsedRequest,
};

const CACHE_CONTROL_OPT_OUT: &str = "no-store";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectRule {
    Root,
    LegacyAlias,
    Cdn,
    Canonical,
    Declared,
}

impl fmt::Display for RedirectRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RedirectRule::Root => "root",
            RedirectRule::LegacyAlias => "legacy_alias",
            RedirectRule::Cdn => "cdn",
            RedirectRule::Canonical => "canonical",
            RedirectRule::Declared => "declared",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub location: String,
    pub rule: RedirectRule,
}

impl Redirect {
    fn new(rule: RedirectRule, location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            rule,
        }
    }
}

/// Raw request facts the rules inspect besides the parsed request.
#[derive(Debug, Clone, Copy)]
pub struct RequestMeta<'a> {
    pub host: &'a str,
    /// Path plus optional query, as received.
    pub uri: &'a str,
    pub cache_control: Option<&'a str>,
}

impl RequestMeta<'_> {
    pub fn path(&self) -> &str {
        self.uri.split_once('?').map_or(self.uri, |(path, _)| path)
    }

    pub fn query(&self) -> Option<&str> {
        self.uri.split_once('?').map(|(_, query)| query)
    }
}

/// A former documentation tree that now lives elsewhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyAlias {
    /// Applies when the host contains any of these markers.
    pub host_markers: Vec<String>,
    /// Path prefix, e.g. `/dokku`.
    pub prefix: String,
    /// Target for the bare prefix.
    pub target: String,
    /// Base for nested paths; `{prefix}/rest` maps to `{docs_target}/rest`.
    pub docs_target: String,
}

impl LegacyAlias {
    fn resolve(&self, meta: &RequestMeta<'_>) -> Option<String> {
        if !self
            .host_markers
            .iter()
            .any(|marker| meta.host.contains(marker.as_str()))
        {
            return None;
        }
        let rest = meta.path().strip_prefix(self.prefix.as_str())?;
        let location = match rest {
            "" | "/" => self.target.clone(),
            _ if rest.starts_with('/') => format!("{}{rest}", self.docs_target),
            _ => return None,
        };
        Some(with_query(location, meta.query()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectRules {
    /// Where the bare `/` goes.
    pub root_target: String,
    /// Base of the asset CDN, e.g. `https://cdn.jsdelivr.net/gh`.
    pub cdn_base: String,
    pub legacy_aliases: Vec<LegacyAlias>,
}

impl RedirectRules {
    /// Rules that only need the request: root, legacy aliases, CDN offload
    /// and canonicalization.
    pub fn canonical(&self, request: &ParsedRequest, meta: &RequestMeta<'_>) -> Option<Redirect> {
        if meta.path() == "/" {
            return Some(Redirect::new(RedirectRule::Root, self.root_target.as_str()));
        }

        if let Some(location) = self
            .legacy_aliases
            .iter()
            .find_map(|alias| alias.resolve(meta))
        {
            return Some(Redirect::new(RedirectRule::LegacyAlias, location));
        }

        let opted_out = meta
            .cache_control
            .is_some_and(|value| value.contains(CACHE_CONTROL_OPT_OUT));
        if is_asset(&request.document) && !opted_out {
            let location = format!(
                "{}/{}/{}@{}/{DOCS_ROOT}{}",
                self.cdn_base.trim_end_matches('/'),
                request.tenant,
                request.repository,
                request.reference,
                request.document,
            );
            return Some(Redirect::new(RedirectRule::Cdn, location));
        }

        canonical_path(meta.path())
            .map(|path| Redirect::new(RedirectRule::Canonical, with_query(path, meta.query())))
    }

    /// Repository-declared redirect for the requested document, if any.
    pub fn declared(&self, request: &ParsedRequest, config: &RepositoryConfig) -> Option<Redirect> {
        let target = config.redirect_for(&request.document)?;
        let location = if target.starts_with("http://") || target.starts_with("https://") {
            target.to_string()
        } else {
            let trimmed = target.strip_suffix('/').unwrap_or(target);
            format!("/{}/{trimmed}/", request.repository_prefix())
        };
        Some(Redirect::new(RedirectRule::Declared, location))
    }
}

impl From<&crate::config::RoutingSettings> for RedirectRules {
    fn from(settings: &crate::config::RoutingSettings) -> Self {
        Self {
            root_target: settings.root_redirect.clone(),
            cdn_base: settings.cdn_base.clone(),
            legacy_aliases: settings
                .legacy_aliases
                .iter()
                .map(|alias| LegacyAlias {
                    host_markers: alias.host_markers.clone(),
                    prefix: alias.prefix.clone(),
                    target: alias.target.clone(),
                    docs_target: alias.docs_target.clone(),
                })
                .collect(),
        }
    }
}

fn with_query(location: String, query: Option<&str>) -> String {
    match query {
        Some(query) => format!("{location}?{query}"),
        None => location,
    }
}

/// Directory form of `path`: markup extensions are dropped and a trailing
/// slash is added to non-asset paths. `None` when already canonical.
fn canonical_path(path: &str) -> Option<String> {
    let trimmed = path.strip_suffix('/');
    let stem = trimmed.unwrap_or(path);

    if let Some(ext) = extension(stem).filter(|ext| MARKDOWN_EXTENSIONS.contains(ext)) {
        let without = &stem[..stem.len() - ext.len()];
        return Some(format!("{without}/"));
    }
    if trimmed.is_none() && !is_asset(path) {
        return Some(format!("{path}/"));
    }
    None
}
