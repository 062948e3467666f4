//! In-Flight Download Registry
//!
//! Coalesces concurrent populate operations for the same destination path
//! into one spawned task whose outcome every waiter shares.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tracing::debug;

use crate::error::{CacheError, Result};

type SharedPopulate = Shared<BoxFuture<'static, Result<PathBuf>>>;
type Registry = Arc<Mutex<HashMap<PathBuf, SharedPopulate>>>;

// == In-Flight Downloads ==
/// Registry of active populate operations keyed by destination path.
///
/// Clones share one registry. Separate instances are fully independent.
#[derive(Clone, Default)]
pub struct InFlightDownloads {
    active: Registry,
}

impl std::fmt::Debug for InFlightDownloads {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InFlightDownloads")
            .field("active", &self.len())
            .finish()
    }
}

/// Drops the registry entry when the producer task ends, panics included.
struct Release {
    registry: Registry,
    path: PathBuf,
}

impl Drop for Release {
    fn drop(&mut self) {
        self.registry.lock().remove(&self.path);
    }
}

impl InFlightDownloads {
    // == Constructor ==
    pub fn new() -> Self {
        Self::default()
    }

    // == Acquire ==
    /// Runs `producer` for `path` unless an operation for `path` is already
    /// running, in which case its outcome is awaited instead.
    ///
    /// The producer runs on its own task: it finishes even if every caller
    /// stops waiting. Its entry is removed on completion, so a later call
    /// after a failure starts a fresh attempt.
    pub async fn acquire<F>(&self, path: PathBuf, producer: F) -> Result<PathBuf>
    where
        F: Future<Output = Result<PathBuf>> + Send + 'static,
    {
        let operation = {
            let mut active = self.active.lock();
            match active.get(&path) {
                Some(existing) => {
                    debug!(path = %path.display(), "Joining in-flight populate");
                    existing.clone()
                }
                None => {
                    let release = Release {
                        registry: Arc::clone(&self.active),
                        path: path.clone(),
                    };
                    // the task cannot take the lock before this block releases it
                    let handle = tokio::spawn(async move {
                        let _release = release;
                        producer.await
                    });
                    let operation = async move {
                        handle.await.unwrap_or_else(|e| {
                            Err(CacheError::Internal(format!("populate task failed: {e}")))
                        })
                    }
                    .boxed()
                    .shared();
                    active.insert(path, operation.clone());
                    operation
                }
            }
        };

        operation.await
    }

    // == Inspection ==
    /// Number of operations currently running.
    pub fn len(&self) -> usize {
        self.active.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True if an operation for `path` is running.
    pub fn contains(&self, path: &Path) -> bool {
        self.active.lock().contains_key(path)
    }
}
