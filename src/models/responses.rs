//! Response DTOs for the image cache API
//!
//! Defines the structure of outgoing HTTP response bodies.

use std::path::PathBuf;

use serde::Serialize;

use crate::cache::EngineStats;

/// Response body for the download and seed operations
#[derive(Debug, Clone, Serialize)]
pub struct CachedResponse {
    /// The requested URL
    pub url: String,
    /// Absolute path of the cached file
    pub path: PathBuf,
}

impl CachedResponse {
    pub fn new(url: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            path: path.into(),
        }
    }
}

/// Response body for DELETE /cache/entry
#[derive(Debug, Clone, Serialize)]
pub struct DeleteResponse {
    /// Success message
    pub message: String,
    /// The URL that was deleted
    pub url: String,
}

impl DeleteResponse {
    pub fn new(url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            message: format!("Url '{}' removed from cache", url),
            url,
        }
    }
}

/// Response body for DELETE /cache
#[derive(Debug, Clone, Serialize)]
pub struct ClearResponse {
    pub message: String,
}

impl ClearResponse {
    pub fn cleared() -> Self {
        Self {
            message: "Cache cleared".to_string(),
        }
    }
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub hits: u64,
    pub misses: u64,
    pub stale_hits: u64,
    pub populations: u64,
    pub failures: u64,
    /// Downloads currently running
    pub in_flight: usize,
    /// hits / lookups
    pub hit_rate: f64,
}

impl StatsResponse {
    pub fn new(stats: &EngineStats, in_flight: usize) -> Self {
        Self {
            hits: stats.hits,
            misses: stats.misses,
            stale_hits: stats.stale_hits,
            populations: stats.populations,
            failures: stats.failures,
            in_flight,
            hit_rate: stats.hit_rate(),
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}
