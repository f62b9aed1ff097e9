//! TTL Sweeper Task
//!
//! Background task that periodically removes expired cache entries.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::MemoryCache;

/// Shortest pause between two sweeps. Shorter intervals are raised to it.
pub const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(10);

/// Spawns a background task that periodically purges expired entries.
///
/// The task holds only a weak reference to the cache. It exits when the
/// cache's lifecycle token is cancelled, or at the next tick after the
/// cache has been dropped. Removal goes through the same table routine as
/// lazy eviction on `get`.
///
/// # Arguments
/// * `cache` - the cache to sweep
/// * `interval` - time between sweeps, at least [`MIN_SWEEP_INTERVAL`]
///
/// # Returns
/// A JoinHandle for the spawned task.
///
/// # Panics
/// Panics if called outside a Tokio runtime.
pub fn spawn_sweeper(cache: &Arc<MemoryCache>, interval: Duration) -> JoinHandle<()> {
    let lifecycle = cache.lifecycle().clone();
    let cache = Arc::downgrade(cache);
    let interval = interval.max(MIN_SWEEP_INTERVAL);

    tokio::spawn(async move {
        info!("Starting TTL sweeper with interval of {:?}", interval);

        loop {
            tokio::select! {
                () = lifecycle.cancelled() => break,
                () = tokio::time::sleep(interval) => {}
            }

            let Some(cache) = cache.upgrade() else {
                break;
            };
            let removed = cache.purge_expired();

            if removed > 0 {
                info!("TTL sweep: removed {} expired entries", removed);
            } else {
                debug!("TTL sweep: no expired entries found");
            }
        }

        info!("TTL sweeper stopped");
    })
}
