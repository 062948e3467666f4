//! Memory Index Module
//!
//! In-process TTL index with optional JSON snapshot persistence.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::{CacheError, Result};
use crate::index::{current_timestamp_ms, CacheIndex, ExpiredEntry, IndexEntry};

// == Memory Index ==
/// HashMap-backed index. Expired entries are dropped lazily on `get` and
/// eagerly on `sweep`.
#[derive(Debug, Default)]
pub struct MemoryIndex {
    /// Canonical URL -> entry
    entries: RwLock<HashMap<String, IndexEntry>>,
    /// Where `persist` writes, if anywhere
    snapshot: Option<PathBuf>,
}

impl MemoryIndex {
    // == Constructor ==
    /// Creates an empty, purely in-memory index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restores an index from the snapshot at `path`, skipping expired
    /// entries. A missing snapshot yields an empty index; an unreadable one
    /// is logged and ignored. Later `persist` calls write back to `path`.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let entries = match tokio::fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice::<HashMap<String, IndexEntry>>(&bytes) {
                Ok(mut entries) => {
                    let now = current_timestamp_ms();
                    entries.retain(|_, entry| !entry.is_expired_at(now));
                    info!(
                        "Restored {} index entries from {}",
                        entries.len(),
                        path.display()
                    );
                    entries
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Ignoring malformed index snapshot");
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(CacheError::filesystem("read", &path, e)),
        };

        Ok(Self {
            entries: RwLock::new(entries),
            snapshot: Some(path),
        })
    }

    /// Snapshot location, if persistence is enabled.
    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot.as_deref()
    }

    // == Length ==
    /// Number of stored entries, including expired ones not yet dropped.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Full entry for `key`, expired or not.
    pub async fn entry(&self, key: &str) -> Option<IndexEntry> {
        self.entries.read().await.get(key).cloned()
    }
}

#[async_trait]
impl CacheIndex for MemoryIndex {
    // == Get ==
    async fn get(&self, key: &str) -> Result<Option<String>> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => return Ok(None),
                Some(entry) if !entry.is_expired() => {
                    return Ok(Some(entry.relative_path.clone()))
                }
                Some(_) => {}
            }
        }

        // expired: drop it unless a concurrent set replaced it meanwhile
        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(IndexEntry::is_expired) {
            entries.remove(key);
            debug!(key, "Dropped expired index entry");
        }
        Ok(None)
    }

    // == Set ==
    async fn set(&self, key: &str, relative_path: &str, ttl_secs: u64) -> Result<()> {
        let entry = IndexEntry::new(relative_path, Some(ttl_secs));
        self.entries.write().await.insert(key.to_string(), entry);
        Ok(())
    }

    // == Remove ==
    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    // == Flush ==
    async fn flush(&self) -> Result<()> {
        self.entries.write().await.clear();
        Ok(())
    }

    // == Sweep ==
    async fn sweep(&self) -> Result<Vec<ExpiredEntry>> {
        let now = current_timestamp_ms();
        let mut entries = self.entries.write().await;

        let expired_keys: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();

        Ok(expired_keys
            .into_iter()
            .filter_map(|key| {
                entries.remove(&key).map(|entry| ExpiredEntry {
                    key,
                    relative_path: entry.relative_path,
                })
            })
            .collect())
    }

    // == Persist ==
    async fn persist(&self) -> Result<()> {
        let Some(path) = &self.snapshot else {
            return Ok(());
        };

        let bytes = {
            let now = current_timestamp_ms();
            let entries = self.entries.read().await;
            let live: HashMap<&String, &IndexEntry> = entries
                .iter()
                .filter(|(_, entry)| !entry.is_expired_at(now))
                .collect();
            serde_json::to_vec(&live)
                .map_err(|e| CacheError::Internal(format!("failed to encode index: {e}")))?
        };

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| CacheError::filesystem("mkdir", parent, e))?;
        }
        let tmp = crate::cache::temp_path(path);
        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|e| CacheError::filesystem("write", &tmp, e))?;
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|e| CacheError::filesystem("move", &tmp, e))?;

        debug!(path = %path.display(), bytes = bytes.len(), "Index snapshot written");
        Ok(())
    }
}
