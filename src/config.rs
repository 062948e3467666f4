//! Configuration Module
//!
//! Handles loading and managing daemon configuration from environment variables.

use std::env;
use std::path::PathBuf;

use crate::cache::{default_cache_root, CacheOptions, QueryPolicy, DEFAULT_TTL_SECS};

/// Daemon configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root directory for cached files
    pub cache_root: PathBuf,
    /// Default TTL in seconds for index entries
    pub default_ttl: u64,
    /// Query parameters that take part in cache keys
    pub query_policy: QueryPolicy,
    /// Accept invalid TLS certificates when downloading
    pub tls_lenient: bool,
    /// HTTP server port
    pub server_port: u16,
    /// Background sweep interval in seconds
    pub sweep_interval: u64,
    /// Where the index snapshot is kept
    pub index_snapshot: PathBuf,
    /// Directory HTTP clients may seed from; seeding is off when unset
    pub seed_dir: Option<PathBuf>,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_ROOT` - Cache directory (default: platform cache dir + `imagesCacheDir`)
    /// - `DEFAULT_TTL` - Index entry TTL in seconds (default: 1209600)
    /// - `QUERY_PARAMS` - `true`, `false` or a comma-separated allow-list (default: false)
    /// - `TLS_LENIENT` - Accept invalid certificates (default: true)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `SWEEP_INTERVAL` - Expired entry sweep frequency in seconds (default: 60)
    /// - `INDEX_SNAPSHOT` - Index snapshot file (default: `<CACHE_ROOT>.index.json`)
    /// - `SEED_DIR` - Directory `POST /cache/seed` may read from (default: unset, seeding off)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let cache_root = env::var("CACHE_ROOT")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.cache_root);

        let index_snapshot = env::var("INDEX_SNAPSHOT")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| snapshot_beside(&cache_root));

        Self {
            default_ttl: env::var("DEFAULT_TTL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.default_ttl),
            query_policy: env::var("QUERY_PARAMS")
                .ok()
                .map(|v| QueryPolicy::parse(&v))
                .unwrap_or(defaults.query_policy),
            tls_lenient: env::var("TLS_LENIENT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.tls_lenient),
            server_port: env::var("SERVER_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.server_port),
            sweep_interval: env::var("SWEEP_INTERVAL")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v| *v > 0)
                .unwrap_or(defaults.sweep_interval),
            seed_dir: env::var("SEED_DIR")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
            cache_root,
            index_snapshot,
        }
    }

    /// Instance-level cache options derived from this configuration.
    pub fn cache_options(&self) -> CacheOptions {
        CacheOptions {
            ttl_secs: self.default_ttl,
            query_policy: self.query_policy.clone(),
            cache_root: self.cache_root.clone(),
            tls_lenient: self.tls_lenient,
            ..CacheOptions::default()
        }
    }
}

/// `<root>.index.json`, next to the cache root rather than inside it.
fn snapshot_beside(cache_root: &std::path::Path) -> PathBuf {
    let mut name = cache_root.as_os_str().to_os_string();
    name.push(".index.json");
    PathBuf::from(name)
}

impl Default for Config {
    fn default() -> Self {
        let cache_root = default_cache_root();
        Self {
            index_snapshot: snapshot_beside(&cache_root),
            cache_root,
            default_ttl: DEFAULT_TTL_SECS,
            query_policy: QueryPolicy::default(),
            tls_lenient: true,
            server_port: 3000,
            sweep_interval: 60,
            seed_dir: None,
        }
    }
}
