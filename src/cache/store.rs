//! Byte-bounded LRU store with soft TTL expiry.

use std::{
    future::Future,
    sync::{Mutex, MutexGuard},
};

use bytes::Bytes;
use lru::LruCache;
use metrics::{counter, gauge};
use time::OffsetDateTime;
use tracing::{debug, warn};

use super::config::CacheConfig;
use super::keys::CacheKey;

pub(crate) const METRIC_CACHE_HIT: &str = "viewdocs_cache_hit_total";
pub(crate) const METRIC_CACHE_MISS: &str = "viewdocs_cache_miss_total";
pub(crate) const METRIC_CACHE_STALE: &str = "viewdocs_cache_stale_total";
pub(crate) const METRIC_CACHE_EVICT: &str = "viewdocs_cache_evict_total";
pub(crate) const METRIC_CACHE_BYTES: &str = "viewdocs_cache_bytes";

/// A stored artifact. Replaced wholesale on overwrite.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub value: Bytes,
    /// Insertion time; only compared against the TTL, never used for ordering.
    pub created_at: OffsetDateTime,
}

impl CacheEntry {
    fn size(&self) -> usize {
        self.value.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    /// Older than the TTL. Already removed; this is the last time it is served.
    Stale,
}

#[derive(Debug, Clone)]
pub struct CacheHit {
    pub value: Bytes,
    pub freshness: Freshness,
}

struct Entries {
    lru: LruCache<String, CacheEntry>,
    size: usize,
}

/// Process-wide artifact cache shared by all request handlers.
///
/// The internal lock is only held for in-memory bookkeeping, never across an
/// await point.
pub struct DocumentCache {
    config: CacheConfig,
    entries: Mutex<Entries>,
}

impl DocumentCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            entries: Mutex::new(Entries {
                lru: LruCache::unbounded(),
                size: 0,
            }),
        }
    }

    pub fn lookup(&self, key: &CacheKey) -> Option<CacheHit> {
        self.lookup_at(key, OffsetDateTime::now_utc())
    }

    /// Look `key` up as of `now`.
    ///
    /// An expired entry is removed and returned once as [`Freshness::Stale`].
    /// With caching disabled the recency bookkeeping still runs but the
    /// lookup always reports a miss.
    pub fn lookup_at(&self, key: &CacheKey, now: OffsetDateTime) -> Option<CacheHit> {
        let rendered = key.to_string();
        let hit = {
            let mut entries = self.entries("lookup");
            let found = entries
                .lru
                .get(&rendered)
                .map(|entry| (entry.value.clone(), now - entry.created_at > self.config.ttl));
            match found {
                Some((value, true)) => {
                    if let Some(expired) = entries.lru.pop(&rendered) {
                        entries.size -= expired.size();
                    }
                    gauge!(METRIC_CACHE_BYTES).set(entries.size as f64);
                    Some(CacheHit {
                        value,
                        freshness: Freshness::Stale,
                    })
                }
                Some((value, false)) => Some(CacheHit {
                    value,
                    freshness: Freshness::Fresh,
                }),
                None => None,
            }
        };

        match hit {
            Some(hit) if self.config.enabled => {
                if hit.freshness == Freshness::Stale {
                    counter!(METRIC_CACHE_STALE).increment(1);
                    debug!(
                        target = "viewdocs::cache",
                        key = %rendered,
                        outcome = "stale",
                        "cache entry expired",
                    );
                } else {
                    debug!(
                        target = "viewdocs::cache",
                        key = %rendered,
                        outcome = "hit",
                        "cache hit",
                    );
                }
                counter!(METRIC_CACHE_HIT).increment(1);
                Some(hit)
            }
            _ => {
                counter!(METRIC_CACHE_MISS).increment(1);
                debug!(
                    target = "viewdocs::cache",
                    key = %rendered,
                    outcome = "miss",
                    "cache miss",
                );
                None
            }
        }
    }

    pub fn store(&self, key: &CacheKey, value: Bytes) -> usize {
        self.store_at(key, value, OffsetDateTime::now_utc())
    }

    /// Insert or overwrite `key`, then evict least-recently-used entries until
    /// the summed value size fits the capacity. Returns the eviction count.
    ///
    /// A value larger than the whole capacity is evicted immediately.
    pub fn store_at(&self, key: &CacheKey, value: Bytes, now: OffsetDateTime) -> usize {
        let rendered = key.to_string();
        let entry = CacheEntry {
            value,
            created_at: now,
        };

        let mut entries = self.entries("store");
        entries.size += entry.size();
        if let Some(previous) = entries.lru.put(rendered.clone(), entry) {
            entries.size -= previous.size();
        }

        let mut evicted = 0;
        while entries.size > self.config.capacity_bytes {
            let Some((evicted_key, evicted_entry)) = entries.lru.pop_lru() else {
                break;
            };
            entries.size -= evicted_entry.size();
            evicted += 1;
            debug!(
                target = "viewdocs::cache",
                key = %evicted_key,
                outcome = "evict",
                "cache capacity eviction",
            );
        }
        let size = entries.size;
        drop(entries);

        if evicted > 0 {
            counter!(METRIC_CACHE_EVICT).increment(evicted as u64);
        }
        gauge!(METRIC_CACHE_BYTES).set(size as f64);
        debug!(
            target = "viewdocs::cache",
            key = %rendered,
            size_bytes = size,
            "cache write",
        );
        evicted
    }

    /// Remove `key`; returns whether it was present.
    pub fn evict(&self, key: &CacheKey) -> bool {
        let mut entries = self.entries("evict");
        match entries.lru.pop(&key.to_string()) {
            Some(entry) => {
                entries.size -= entry.size();
                gauge!(METRIC_CACHE_BYTES).set(entries.size as f64);
                true
            }
            None => false,
        }
    }

    /// Serve `key` from the cache, or run `load` and store its output.
    ///
    /// Concurrent misses on one key may both run `load`; the last store wins.
    /// Errors are returned as-is and never cached.
    pub async fn read_through<F, Fut, E>(&self, key: &CacheKey, load: F) -> Result<Bytes, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Bytes, E>>,
    {
        if let Some(hit) = self.lookup(key) {
            return Ok(hit.value);
        }

        let value = load().await?;
        self.store(key, value.clone());
        Ok(value)
    }

    /// Lock the entry table, recovering from poisoning.
    fn entries(&self, op: &'static str) -> MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(|poisoned| {
            warn!(
                target = "viewdocs::cache",
                op,
                result = "poisoned_recovered",
                "recovered from poisoned cache lock"
            );
            poisoned.into_inner()
        })
    }

    /// Summed byte length of all stored values.
    pub fn size_bytes(&self) -> usize {
        self.entries("size_bytes").size
    }

    pub fn len(&self) -> usize {
        self.entries("len").lru.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
