//! Cache Module
//!
//! URL keying, file operations, download coalescing and the cache engine.

pub mod codec;
mod engine;
mod file_ops;
pub mod fs;
mod inflight;
mod options;
mod overlay;
mod stats;
pub mod transport;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use codec::{is_cacheable, CacheKey};
pub use engine::CacheEngine;
pub use file_ops::{temp_path, CacheInfo, EntryKind, FileOps, StatEntry, TEMP_SUFFIX};
pub use fs::{FileStat, FileSystem, TokioFs};
pub use inflight::InFlightDownloads;
pub use options::{
    default_cache_root, CacheOptions, CacheOverrides, QueryPolicy, CACHE_DIR_NAME,
    DEFAULT_TTL_SECS,
};
pub use overlay::{CachedResolver, ResolvedPaths};
pub use stats::EngineStats;
pub use transport::{HttpTransport, TransferOutcome, Transport};
