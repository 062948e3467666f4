//! Expired Entry Sweep Task
//!
//! Background task that periodically evicts expired index entries, deletes
//! the files they pointed at and persists the index.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::CacheEngine;

/// Spawns a background task that sweeps `engine` every `interval_secs`.
///
/// Failures are logged and the loop keeps going. The returned handle is
/// meant to be aborted during graceful shutdown.
///
/// # Example
/// ```ignore
/// let handle = spawn_sweep_task(engine.clone(), 60);
/// // Later, during shutdown:
/// handle.abort();
/// ```
pub fn spawn_sweep_task(engine: CacheEngine, interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            "Starting index sweep task with interval of {} seconds",
            interval.as_secs()
        );

        loop {
            tokio::time::sleep(interval).await;

            match engine.sweep_expired().await {
                Ok(0) => debug!("Index sweep: no expired entries found"),
                Ok(removed) => info!("Index sweep: removed {} expired entries", removed),
                Err(e) => warn!(error = %e, "Index sweep failed"),
            }

            if let Err(e) = engine.persist_index().await {
                warn!(error = %e, "Failed to persist index");
            }
        }
    })
}
