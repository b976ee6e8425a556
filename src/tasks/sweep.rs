//! Expiration Sweep Task
//!
//! Background task that periodically asks the cache backend to drop expired
//! records, so keys nobody reads again do not linger on disk.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::Cache;

/// Spawns a background task that periodically sweeps expired records.
///
/// Each sweep runs on the blocking pool since it walks the storage
/// directory with synchronous I/O.
///
/// # Arguments
/// * `cache` - Shared cache facade
/// * `interval_secs` - Seconds between sweeps
///
/// # Returns
/// A JoinHandle for the spawned task, to abort it during graceful shutdown.
///
/// # Example
/// ```ignore
/// let cache = Arc::new(Cache::new(&CacheConfig::file("/tmp/cache"))?);
/// let sweep_handle = spawn_sweep_task(cache.clone(), 60);
/// // Later, during shutdown:
/// sweep_handle.abort();
/// ```
pub fn spawn_sweep_task(cache: Arc<Cache>, interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            "Starting expiration sweep with interval of {} seconds",
            interval.as_secs()
        );

        loop {
            tokio::time::sleep(interval).await;

            let cache = Arc::clone(&cache);
            match tokio::task::spawn_blocking(move || cache.remove_expired_keys()).await {
                Ok(()) => debug!("Expiration sweep finished"),
                Err(e) => warn!(error = %e, "Expiration sweep failed"),
            }
        }
    })
}
