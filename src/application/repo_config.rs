//! Optional per-repository settings read from `docs/viewdocs.json`.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::{debug, warn};

use super::{
    cascade::FetchChain,
    source::{SourceError, SourceLocation},
};
use crate::{
    cache::{CacheKey, DocumentCache},
    domain::request::ParsedRequest,
};

pub const REPOSITORY_CONFIG_PATH: &str = "docs/viewdocs.json";

/// Known keys of the repository config. Unknown keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    /// Document path → absolute URL or in-repository path.
    #[serde(deserialize_with = "string_entries")]
    pub redirects: BTreeMap<String, String>,
}

/// Keep string-valued entries; any other value drops only its own entry.
fn string_entries<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let entries = BTreeMap::<String, Value>::deserialize(deserializer)?;
    Ok(entries
        .into_iter()
        .filter_map(|(from, to)| match to {
            Value::String(to) => Some((from, to)),
            other => {
                warn!(
                    target = "viewdocs::repo_config",
                    document = %from,
                    value = %other,
                    "ignoring non-string redirect target"
                );
                None
            }
        })
        .collect())
}

impl RepositoryConfig {
    /// Parse a raw config body. Empty or malformed input yields the empty config.
    pub fn parse(raw: &[u8]) -> Self {
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Self::default();
        }
        match serde_json::from_slice(raw) {
            Ok(config) => config,
            Err(err) => {
                warn!(
                    target = "viewdocs::repo_config",
                    error = %err,
                    "ignoring malformed repository config"
                );
                Self::default()
            }
        }
    }

    pub fn redirect_for(&self, document: &str) -> Option<&str> {
        self.redirects.get(document).map(String::as_str)
    }
}

/// Load the repository config through the cache.
///
/// Absence is cached as an empty body; transport failures are not cached and
/// degrade to the empty config.
pub async fn load_repository_config(
    chain: &FetchChain,
    cache: &DocumentCache,
    request: &ParsedRequest,
) -> RepositoryConfig {
    let key = CacheKey::repository_config(request);
    let location = SourceLocation::from(request);

    let raw = cache
        .read_through(&key, || async {
            let body = chain.fetch_file(&location, REPOSITORY_CONFIG_PATH).await?;
            Ok::<_, SourceError>(body.unwrap_or_default())
        })
        .await;

    match raw {
        Ok(raw) => RepositoryConfig::parse(&raw),
        Err(err) => {
            debug!(
                target = "viewdocs::repo_config",
                location = %location,
                error = %err,
                "repository config unavailable"
            );
            RepositoryConfig::default()
        }
    }
}
