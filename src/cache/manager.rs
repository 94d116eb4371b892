//! Cache manager.

use super::backend::{KeyValueStore, MemoryStore};
use super::entry::{now_millis, CacheEntry};
use super::key::CacheKey;
use crate::config::{CacheConfig, TtlFallback};
use crate::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Per-request caching directive as seen before the request is issued.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RequestMeta {
    /// Milliseconds. Absent or NaN means "do not cache".
    pub ttl_override: Option<f64>,
}

impl RequestMeta {
    pub fn with_ttl(ttl_ms: f64) -> Self {
        Self {
            ttl_override: Some(ttl_ms),
        }
    }
}

/// A completed response about to be cached.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseMeta<T = Value> {
    pub ttl_override: Option<f64>,
    pub data: T,
}

impl<T> ResponseMeta<T> {
    pub fn new(ttl_override: Option<f64>, data: T) -> Self {
        Self { ttl_override, data }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub deletes: u64,
    pub errors: u64,
}

impl CacheStats {
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Default)]
struct AtomicStats {
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    deletes: AtomicU64,
    errors: AtomicU64,
}

impl AtomicStats {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn to_stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            sets: self.sets.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Time-bounded response cache over a pluggable [`KeyValueStore`].
///
/// Expiry is lazy: an expired or undecodable entry is evicted when it is
/// next read (or by an explicit [`CacheManager::sweep_expired`]).
pub struct CacheManager {
    config: CacheConfig,
    store: Arc<dyn KeyValueStore>,
    stats: AtomicStats,
}

impl CacheManager {
    pub fn new(config: CacheConfig, store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            config,
            store,
            stats: AtomicStats::default(),
        }
    }

    pub fn in_memory(config: CacheConfig) -> Self {
        Self::new(config, Arc::new(MemoryStore::new()))
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    pub fn store_name(&self) -> &'static str {
        self.store.name()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.to_stats()
    }

    pub fn get_cache_key(&self, request_id: &str) -> String {
        CacheKey::derive(&self.config.cache_prefix, request_id).into_string()
    }

    /// Cacheable iff the TTL override is a number greater than -1.
    pub fn is_cacheable(&self, meta: &RequestMeta) -> bool {
        matches!(meta.ttl_override, Some(ttl) if ttl > -1.0)
    }

    pub fn is_valid_response(&self, entry: &CacheEntry) -> bool {
        let valid = entry.is_valid_at(now_millis());
        if !valid && self.config.debug {
            debug!(cached_until = ?entry.cached_until, "CACHE: response expired");
        }
        valid
    }

    /// Effective TTL in milliseconds for a response.
    ///
    /// Under [`TtlFallback::Falsy`] an explicit `0` (or NaN) falls back to the
    /// default TTL, which keeps stored entries compatible with existing
    /// callers. [`TtlFallback::Nullish`] only substitutes an absent override.
    pub fn resolve_ttl(&self, ttl_override: Option<f64>) -> f64 {
        match (self.config.ttl_fallback, ttl_override) {
            (TtlFallback::Falsy, Some(ttl)) if ttl != 0.0 && !ttl.is_nan() => ttl,
            (TtlFallback::Nullish, Some(ttl)) => ttl,
            _ => self.config.default_ttl,
        }
    }

    pub async fn add_response<T: Serialize>(
        &self,
        request_id: &str,
        meta: &ResponseMeta<T>,
    ) -> Result<()> {
        if self.config.debug {
            debug!(request_id, "CACHE: adding response");
        }
        let ttl = self.resolve_ttl(meta.ttl_override);
        let until = now_millis() + ttl;
        // A zero TTL produces an entry that is never valid.
        let cached_until = (ttl != 0.0 && !until.is_nan()).then_some(until);
        let entry = CacheEntry::new(cached_until, serde_json::to_value(&meta.data)?);
        let raw = serde_json::to_string(&entry)?;
        match self.store.set(&self.get_cache_key(request_id), &raw).await {
            Ok(()) => {
                AtomicStats::bump(&self.stats.sets);
                Ok(())
            }
            Err(e) => {
                AtomicStats::bump(&self.stats.errors);
                Err(e)
            }
        }
    }

    /// Cached payload for `request_id`, or `None` on miss, expiry, corruption
    /// or store failure.
    pub async fn get_response(&self, request_id: &str) -> Option<Value> {
        if self.config.debug {
            debug!(request_id, "CACHE: check response existence");
        }
        let key = self.get_cache_key(request_id);
        let raw = match self.store.get(&key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                AtomicStats::bump(&self.stats.misses);
                if self.config.debug {
                    debug!(request_id, "CACHE: response doesn't exist");
                }
                return None;
            }
            Err(e) => {
                AtomicStats::bump(&self.stats.errors);
                warn!(request_id, store = self.store.name(), "CACHE: store read failed: {}", e);
                return None;
            }
        };

        let entry: CacheEntry = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                AtomicStats::bump(&self.stats.errors);
                warn!(request_id, "CACHE: corrupt entry, evicting: {}", e);
                self.evict(request_id).await;
                return None;
            }
        };

        if !self.is_valid_response(&entry) {
            AtomicStats::bump(&self.stats.misses);
            self.evict(request_id).await;
            return None;
        }

        AtomicStats::bump(&self.stats.hits);
        if self.config.debug {
            debug!(request_id, cached_until = ?entry.cached_until, "CACHE: response found");
        }
        Some(entry.cached_data)
    }

    /// Typed variant of [`CacheManager::get_response`]. A payload that does not
    /// decode as `T` is treated as a miss.
    pub async fn get_response_as<T: DeserializeOwned>(&self, request_id: &str) -> Option<T> {
        let data = self.get_response(request_id).await?;
        match serde_json::from_value(data) {
            Ok(val) => Some(val),
            Err(e) => {
                AtomicStats::bump(&self.stats.errors);
                warn!(request_id, "CACHE: cached payload has unexpected shape: {}", e);
                None
            }
        }
    }

    /// Delete the entry for `request_id`. Absent keys are a no-op.
    pub async fn remove_response(&self, request_id: &str) -> Result<()> {
        if self.config.debug {
            debug!(request_id, "CACHE: removing response");
        }
        match self.store.remove(&self.get_cache_key(request_id)).await {
            Ok(()) => {
                AtomicStats::bump(&self.stats.deletes);
                Ok(())
            }
            Err(e) => {
                AtomicStats::bump(&self.stats.errors);
                Err(e)
            }
        }
    }

    /// Remove every entry under the configured prefix. Keys belonging to
    /// other prefixes sharing the store are left alone.
    pub async fn clear_all(&self) -> Result<usize> {
        let mut removed = 0;
        for key in self.store.keys().await? {
            if CacheKey::request_id(&key, &self.config.cache_prefix).is_some() {
                self.store.remove(&key).await?;
                AtomicStats::bump(&self.stats.deletes);
                removed += 1;
            }
        }
        if self.config.debug {
            debug!(removed, "CACHE: cleared");
        }
        Ok(removed)
    }

    /// Evict up to `limit` expired or undecodable entries under the prefix.
    pub async fn sweep_expired(&self, limit: usize) -> Result<usize> {
        let now = now_millis();
        let mut removed = 0;
        for key in self.store.keys().await? {
            if removed >= limit {
                break;
            }
            if CacheKey::request_id(&key, &self.config.cache_prefix).is_none() {
                continue;
            }
            let stale = match self.store.get(&key).await? {
                Some(raw) => serde_json::from_str::<CacheEntry>(&raw)
                    .map(|entry| !entry.is_valid_at(now))
                    .unwrap_or(true),
                None => false,
            };
            if stale {
                self.store.remove(&key).await?;
                AtomicStats::bump(&self.stats.deletes);
                removed += 1;
            }
        }
        if removed > 0 && self.config.debug {
            debug!(removed, "CACHE: swept expired entries");
        }
        Ok(removed)
    }

    async fn evict(&self, request_id: &str) {
        if let Err(e) = self.remove_response(request_id).await {
            warn!(request_id, "CACHE: eviction failed: {}", e);
        }
    }
}
