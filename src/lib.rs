//! Image Cache - a content-addressable local cache for remote image URLs
//!
//! Maps image URLs to deterministic files on disk, downloads each file at
//! most once at a time, and tracks freshness in a TTL index.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod index;
pub mod models;
pub mod tasks;

pub use api::AppState;
pub use cache::{CacheEngine, CacheOptions, CacheOverrides, CachedResolver, QueryPolicy};
pub use config::Config;
pub use error::{CacheError, Result};
pub use tasks::spawn_sweep_task;
