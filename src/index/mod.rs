//! Index Module
//!
//! TTL key-value store mapping canonical URLs to relative cache paths.

mod entry;
mod memory;

use async_trait::async_trait;

use crate::error::Result;

pub use entry::{current_timestamp_ms, IndexEntry};
pub use memory::MemoryIndex;

// == Expired Entry ==
/// An entry removed by [`CacheIndex::sweep`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiredEntry {
    pub key: String,
    pub relative_path: String,
}

// == Cache Index Trait ==
/// Externally synchronized TTL store. Every operation is atomic on its own.
#[async_trait]
pub trait CacheIndex: Send + Sync {
    /// Returns the stored relative path, or `None` if absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Stores `relative_path` under `key` for `ttl_secs` seconds, replacing
    /// any previous entry.
    async fn set(&self, key: &str, relative_path: &str, ttl_secs: u64) -> Result<()>;

    /// Removes `key`; absent keys are not an error.
    async fn remove(&self, key: &str) -> Result<()>;

    /// Removes every entry.
    async fn flush(&self) -> Result<()>;

    /// Proactively drops expired entries and returns them. Stores that only
    /// expire lazily return nothing.
    async fn sweep(&self) -> Result<Vec<ExpiredEntry>> {
        Ok(Vec::new())
    }

    /// Writes the index to durable storage, if it has any.
    async fn persist(&self) -> Result<()> {
        Ok(())
    }
}
