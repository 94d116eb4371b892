//! # http-lifecycle
//!
//! Cooperative cancellation and TTL response caching for HTTP clients.
//!
//! ## Overview
//!
//! Two independent, composable managers carry all of the state:
//!
//! - **Request tracking**: [`tracker::RequestManager`] owns the pending,
//!   cancelable requests and groups them by caller-defined context, so a
//!   request can be cancelled individually, by context, or globally.
//! - **Response caching**: [`cache::CacheManager`] stores successful responses
//!   under a caller-supplied request id with an absolute expiry, backed by a
//!   pluggable [`cache::KeyValueStore`].
//!
//! The two never call each other. [`interceptors::Lifecycle`] orchestrates both
//! around a request function (or an [`transport::HttpTransport`] call).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use http_lifecycle::cache::MemoryStore;
//! use http_lifecycle::interceptors::{Lifecycle, RequestDescriptor};
//! use http_lifecycle::transport::HttpTransport;
//! use http_lifecycle::LifecycleConfig;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> http_lifecycle::Result<()> {
//!     let lifecycle = Lifecycle::new(LifecycleConfig::default(), Arc::new(MemoryStore::new()))?;
//!     let transport = HttpTransport::new("https://api.example.com")?;
//!
//!     let req = RequestDescriptor::new()
//!         .with_id("user-42")
//!         .with_context("profile-view")
//!         .with_ttl(60_000.0);
//!     let outcome = lifecycle.get_json(req, &transport, "/users/42").await?;
//!     println!("cached={} data={}", outcome.cached, outcome.data);
//!
//!     // The view is closing: cancel anything it still has in flight.
//!     lifecycle.teardown("profile-view");
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`tracker`] | Pending-request registry and cancel handles |
//! | [`cache`] | Response cache, entries and key-value stores |
//! | [`interceptors`] | Integration layer and request hooks |
//! | [`transport`] | reqwest-backed JSON transport |
//! | [`config`] | Options, defaults, YAML and environment loading |

pub mod cache;
pub mod config;
pub mod interceptors;
pub mod tracker;
pub mod transport;

pub use config::{CacheConfig, LifecycleConfig, TtlFallback};
pub use interceptors::{Interceptor, Lifecycle, Outcome, RequestDescriptor};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};

/// Install a `tracing` subscriber filtered by `RUST_LOG` (default `info`).
///
/// Safe to call more than once; only the first call installs anything.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
