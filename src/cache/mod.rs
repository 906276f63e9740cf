//! Viewdocs artifact cache.
//!
//! A single process-wide LRU bounded by the total byte size of stored values.
//! Entries carry their insertion time and expire softly after the configured
//! TTL: the first lookup past the TTL still serves the value and drops it.
//!
//! Rendered pages, resolved templates and raw repository configs share the
//! store under distinct [`CacheKey`] namespaces. Nothing here is durable.

mod config;
mod keys;
mod store;

pub use config::{CacheConfig, DEFAULT_CAPACITY_BYTES, DEFAULT_TTL};
pub use keys::CacheKey;
pub use store::{CacheEntry, CacheHit, DocumentCache, Freshness};

pub(crate) use store::{
    METRIC_CACHE_BYTES, METRIC_CACHE_EVICT, METRIC_CACHE_HIT, METRIC_CACHE_MISS,
    METRIC_CACHE_STALE,
};
