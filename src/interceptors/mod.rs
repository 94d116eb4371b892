//! Integration layer: runs a request through the tracker and the cache.
//!
//! The tracker and the cache never call each other. [`Lifecycle`] is the
//! glue that orchestrates both against one request id:
//!
//! 1. a context without an id gets an auto-generated id;
//! 2. a cacheable request with a valid entry is answered from the cache and
//!    the request function is never called;
//! 3. otherwise the request is registered with the tracker and raced
//!    against its cancel signal;
//! 4. on completion it is removed from the tracker and, when cacheable,
//!    stored in the cache.
//!
//! Interceptors observe steps 3 and 4 for logging, metrics or custom hooks.

use crate::cache::{CacheManager, KeyValueStore, RequestMeta, ResponseMeta};
use crate::config::LifecycleConfig;
use crate::tracker::{cancel_pair, RequestManager};
use crate::transport::HttpTransport;
use crate::{Error, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

const AUTO_ID_PREFIX: &str = "auto-generated-id-";

/// Request fields the lifecycle layer reads.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestDescriptor {
    /// Required for tracking and caching to apply.
    pub id: Option<String>,
    /// Groups requests for batch cancellation.
    pub context: Option<String>,
    /// Milliseconds; controls cacheability and TTL.
    pub ttl_override: Option<f64>,
}

impl RequestDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_ttl(mut self, ttl_ms: f64) -> Self {
        self.ttl_override = Some(ttl_ms);
        self
    }

    pub fn request_meta(&self) -> RequestMeta {
        RequestMeta {
            ttl_override: self.ttl_override,
        }
    }
}

/// Result of [`Lifecycle::execute`].
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    /// The id the request ran under (possibly auto-generated).
    pub request_id: Option<String>,
    pub data: Value,
    /// `true` when served from the cache without calling the request function.
    pub cached: bool,
}

/// Hooks around tracked requests. Cache hits bypass them.
#[async_trait]
pub trait Interceptor: Send + Sync {
    async fn on_request_start(&self, _req: &RequestDescriptor) {}

    async fn on_request_complete(&self, _req: &RequestDescriptor, _data: &Value) {}

    async fn on_request_error(&self, _req: &RequestDescriptor, _err: &Error) {}
}

/// Tracker entry owned by one in-flight `execute` call.
struct Registration<'a> {
    tracker: &'a RequestManager,
    id: &'a str,
    seq: u64,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        self.tracker.remove_registration(self.id, self.seq);
    }
}

pub struct Lifecycle {
    tracker: Arc<RequestManager>,
    cache: Arc<CacheManager>,
    interceptors: Vec<Box<dyn Interceptor>>,
    debug: bool,
}

impl Lifecycle {
    pub fn new(config: LifecycleConfig, store: Arc<dyn KeyValueStore>) -> Result<Self> {
        config.validate()?;
        let tracker = Arc::new(RequestManager::new(config.debug));
        let cache = Arc::new(CacheManager::new(config.cache_config(), store));
        Ok(Self {
            tracker,
            cache,
            interceptors: Vec::new(),
            debug: config.debug,
        })
    }

    /// Share existing managers, e.g. one cache across several clients.
    pub fn from_parts(tracker: Arc<RequestManager>, cache: Arc<CacheManager>) -> Self {
        let debug = cache.config().debug;
        Self {
            tracker,
            cache,
            interceptors: Vec::new(),
            debug,
        }
    }

    pub fn with<I: Interceptor + 'static>(mut self, interceptor: I) -> Self {
        self.interceptors.push(Box::new(interceptor));
        self
    }

    pub fn tracker(&self) -> &Arc<RequestManager> {
        &self.tracker
    }

    pub fn cache(&self) -> &Arc<CacheManager> {
        &self.cache
    }

    /// Run `f` under tracking and caching as described in the module docs.
    ///
    /// A cancelled request resolves to [`Error::Cancelled`] carrying the reason
    /// given to the tracker; the in-flight future is dropped.
    pub async fn execute<F, Fut>(&self, mut req: RequestDescriptor, f: F) -> Result<Outcome>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value>>,
    {
        if req.context.is_some() && req.id.is_none() {
            req.id = Some(format!("{}{}", AUTO_ID_PREFIX, Uuid::new_v4()));
        }
        let Some(id) = req.id.clone() else {
            let data = f().await?;
            return Ok(Outcome {
                request_id: None,
                data,
                cached: false,
            });
        };

        let cacheable = self.cache.is_cacheable(&req.request_meta());
        if cacheable {
            if let Some(data) = self.cache.get_response(&id).await {
                if self.debug {
                    debug!(request_id = %id, "serving cached response");
                }
                return Ok(Outcome {
                    request_id: Some(id),
                    data,
                    cached: true,
                });
            }
        }

        for ic in &self.interceptors {
            ic.on_request_start(&req).await;
        }

        let (handle, signal) = cancel_pair();
        let seq = self.tracker.add_request(&id, req.context.as_deref(), handle);
        // Released on completion, and also when this future is dropped early.
        let registration = Registration {
            tracker: &self.tracker,
            id: &id,
            seq,
        };

        let result = tokio::select! {
            biased;
            reason = signal.cancelled() => Err(Error::Cancelled { id: id.clone(), reason }),
            res = f() => res,
        };
        drop(registration);

        match result {
            Ok(data) => {
                if cacheable {
                    let meta = ResponseMeta::new(req.ttl_override, &data);
                    if let Err(e) = self.cache.add_response(&id, &meta).await {
                        warn!(request_id = %id, "failed to cache response: {}", e);
                    }
                }
                for ic in &self.interceptors {
                    ic.on_request_complete(&req, &data).await;
                }
                Ok(Outcome {
                    request_id: Some(id),
                    data,
                    cached: false,
                })
            }
            Err(err) => {
                for ic in &self.interceptors {
                    ic.on_request_error(&req, &err).await;
                }
                Err(err)
            }
        }
    }

    /// `GET base_url + path` through [`Lifecycle::execute`].
    pub async fn get_json(
        &self,
        req: RequestDescriptor,
        transport: &HttpTransport,
        path: &str,
    ) -> Result<Outcome> {
        self.execute(req, || transport.execute_get(path)).await
    }

    /// Cancel one request by id, or every request in a context.
    pub fn cancel(&self, id_or_context: &str, reason: Option<&str>) {
        if !id_or_context.is_empty() {
            self.tracker.cancel_request(id_or_context, reason);
        }
    }

    pub fn cancel_all(&self, reason: Option<&str>) {
        self.tracker.cancel_all_requests(reason);
    }

    /// The owner of `context` is going away: cancel whatever it started.
    pub fn teardown(&self, context: &str) {
        self.tracker.cancel_context_requests(context);
    }

    pub async fn clear_cache(&self, request_id: &str) -> Result<()> {
        self.cache.remove_response(request_id).await
    }

    pub async fn clear_all_cache(&self) -> Result<usize> {
        self.cache.clear_all().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;
    use serde_json::json;

    fn lifecycle() -> Lifecycle {
        Lifecycle::new(LifecycleConfig::default(), Arc::new(MemoryStore::new())).unwrap()
    }

    #[tokio::test]
    async fn context_without_id_gets_generated_id() {
        let lc = lifecycle();
        let out = lc
            .execute(RequestDescriptor::new().with_context("view"), || async {
                Ok(json!(1))
            })
            .await
            .unwrap();
        let id = out.request_id.unwrap();
        assert!(id.starts_with(AUTO_ID_PREFIX));
        assert!(lc.tracker().is_empty());
    }

    #[tokio::test]
    async fn anonymous_requests_are_untracked() {
        let lc = lifecycle();
        let out = lc
            .execute(RequestDescriptor::new(), || async { Ok(json!("x")) })
            .await
            .unwrap();
        assert_eq!(out.request_id, None);
        assert!(!out.cached);
    }

    #[tokio::test]
    async fn failure_releases_tracking() {
        let lc = lifecycle();
        let err = lc
            .execute(RequestDescriptor::new().with_id("r"), || async {
                Err(Error::Remote {
                    status: 500,
                    message: "boom".into(),
                })
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Remote { status: 500, .. }));
        assert!(!lc.tracker().has("r"));
    }
}
