//! Cache configuration.

use std::time::Duration;

/// 256 MiB of rendered output.
pub const DEFAULT_CAPACITY_BYTES: usize = 256 * 1024 * 1024;

/// Shorter than the ~120s TTL of the raw-content CDN in front of the origin.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// When false every lookup reports a miss; stores still happen.
    pub enabled: bool,
    /// Upper bound on the summed byte length of all cached values.
    pub capacity_bytes: usize,
    /// Age after which an entry is served once more and then dropped.
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity_bytes: DEFAULT_CAPACITY_BYTES,
            ttl: DEFAULT_TTL,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            capacity_bytes: settings.capacity_bytes.get(),
            ttl: settings.ttl,
        }
    }
}
