//! # Response Caching Module
//!
//! Time-bounded caching of successful responses, keyed by a caller-supplied
//! request id and persisted through a pluggable key-value store.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`CacheManager`] | Cacheability and validity checks, store, retrieve, evict |
//! | [`CacheEntry`] | Stored payload plus absolute expiry (epoch millis) |
//! | [`KeyValueStore`] | Trait for implementing custom stores |
//! | [`MemoryStore`] | Process-local store |
//! | [`FileStore`] | JSON file store, survives restarts |
//! | [`NullStore`] | No-op store for disabling caching |
//! | [`spawn_sweeper`] | Optional bounded background eviction |
//!
//! ## Example
//!
//! ```rust
//! use http_lifecycle::cache::{CacheManager, RequestMeta, ResponseMeta};
//! use http_lifecycle::config::CacheConfig;
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> http_lifecycle::Result<()> {
//! let cache = CacheManager::in_memory(CacheConfig::default());
//! let meta = RequestMeta::with_ttl(60_000.0);
//! if cache.is_cacheable(&meta) {
//!     cache
//!         .add_response("users", &ResponseMeta::new(meta.ttl_override, json!([1, 2])))
//!         .await?;
//! }
//! assert_eq!(cache.get_response("users").await, Some(json!([1, 2])));
//! # Ok(())
//! # }
//! ```
//!
//! ## Expiry
//!
//! Entries carry an absolute `cached_until`. Expired entries are removed
//! lazily when read; there is no background sweep unless one is spawned.

mod backend;
mod entry;
mod key;
mod manager;
mod sweep;

pub use backend::{FileStore, KeyValueStore, MemoryStore, NullStore};
pub use entry::{is_valid_until, now_millis, CacheEntry, NEVER_EXPIRES};
pub use key::CacheKey;
pub use manager::{CacheManager, CacheStats, RequestMeta, ResponseMeta};
pub use sweep::{spawn_sweeper, MIN_SWEEP_PERIOD};
