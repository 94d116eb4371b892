//! Optional periodic eviction of expired entries.
//!
//! Read-time eviction in [`CacheManager::get_response`] stays authoritative;
//! the sweeper only bounds how long dead entries occupy a durable store.

use super::manager::CacheManager;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Shortest accepted sweep period; a zero period is raised to this.
pub const MIN_SWEEP_PERIOD: Duration = Duration::from_millis(1);

/// Run [`CacheManager::sweep_expired`] every `every`, evicting at most
/// `limit` entries per tick. Abort the returned handle to stop it.
pub fn spawn_sweeper(cache: Arc<CacheManager>, every: Duration, limit: usize) -> JoinHandle<()> {
    if every < MIN_SWEEP_PERIOD {
        warn!(?every, "cache sweep period too short, using {:?}", MIN_SWEEP_PERIOD);
    }
    let every = every.max(MIN_SWEEP_PERIOD);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match cache.sweep_expired(limit).await {
                Ok(0) => {}
                Ok(removed) => debug!(removed, store = cache.store_name(), "cache sweep"),
                Err(e) => warn!(store = cache.store_name(), "cache sweep failed: {}", e),
            }
        }
    })
}
