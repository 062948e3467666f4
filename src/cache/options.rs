//! Cache Options Module
//!
//! Typed per-instance options and call-site overrides with an explicit merge.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// == Defaults ==
/// Default time-to-live for index entries: two weeks.
pub const DEFAULT_TTL_SECS: u64 = 60 * 60 * 24 * 14;

/// Subfolder created under the platform cache directory.
pub const CACHE_DIR_NAME: &str = "imagesCacheDir";

/// Returns the platform cache directory joined with [`CACHE_DIR_NAME`].
///
/// Falls back to the system temp directory when the platform has no
/// cache directory.
pub fn default_cache_root() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(CACHE_DIR_NAME)
}

// == Query Policy ==
/// Which query parameters take part in a URL's cache identity.
///
/// Serialized as `false`, `true` or a list of parameter names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryPolicy {
    /// `false` drops every parameter, `true` keeps all of them
    Flag(bool),
    /// Keep only the named parameters
    Only(Vec<String>),
}

impl QueryPolicy {
    /// Drop the whole query string.
    pub fn none() -> Self {
        QueryPolicy::Flag(false)
    }

    /// Keep the whole query string.
    pub fn all() -> Self {
        QueryPolicy::Flag(true)
    }

    /// Keep only the given parameter names.
    pub fn only<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        QueryPolicy::Only(names.into_iter().map(Into::into).collect())
    }

    /// Parses `true`, `false` or a comma-separated allow-list.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "false" => QueryPolicy::none(),
            "true" => QueryPolicy::all(),
            _ => QueryPolicy::only(
                raw.split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty()),
            ),
        }
    }

    /// Returns true if a parameter named `name` is retained.
    pub fn retains(&self, name: &str) -> bool {
        match self {
            QueryPolicy::Flag(keep) => *keep,
            QueryPolicy::Only(names) => names.iter().any(|n| n == name),
        }
    }
}

impl Default for QueryPolicy {
    fn default() -> Self {
        QueryPolicy::none()
    }
}

// == Cache Options ==
/// Fully resolved options for one cache operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheOptions {
    /// Headers sent with every download request
    pub headers: BTreeMap<String, String>,
    /// Index entry lifetime in seconds
    pub ttl_secs: u64,
    /// Query parameters that take part in the cache key
    pub query_policy: QueryPolicy,
    /// Root directory for cached files
    pub cache_root: PathBuf,
    /// Accept invalid TLS certificates when downloading
    pub tls_lenient: bool,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            headers: BTreeMap::new(),
            ttl_secs: DEFAULT_TTL_SECS,
            query_policy: QueryPolicy::default(),
            cache_root: default_cache_root(),
            tls_lenient: true,
        }
    }
}

impl CacheOptions {
    /// Returns a copy of `self` with every present override applied.
    ///
    /// Overrides replace fields wholesale; header maps are not merged key by key.
    pub fn merge(&self, overrides: &CacheOverrides) -> CacheOptions {
        CacheOptions {
            headers: overrides
                .headers
                .clone()
                .unwrap_or_else(|| self.headers.clone()),
            ttl_secs: overrides.ttl_secs.unwrap_or(self.ttl_secs),
            query_policy: overrides
                .query_policy
                .clone()
                .unwrap_or_else(|| self.query_policy.clone()),
            cache_root: overrides
                .cache_root
                .clone()
                .unwrap_or_else(|| self.cache_root.clone()),
            tls_lenient: overrides.tls_lenient.unwrap_or(self.tls_lenient),
        }
    }
}

// == Cache Overrides ==
/// Call-site overrides; absent fields fall back to the instance options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheOverrides {
    pub headers: Option<BTreeMap<String, String>>,
    pub ttl_secs: Option<u64>,
    pub query_policy: Option<QueryPolicy>,
    pub cache_root: Option<PathBuf>,
    pub tls_lenient: Option<bool>,
}

impl CacheOverrides {
    pub fn with_headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.headers = Some(headers);
        self
    }

    pub fn with_ttl_secs(mut self, ttl_secs: u64) -> Self {
        self.ttl_secs = Some(ttl_secs);
        self
    }

    pub fn with_query_policy(mut self, policy: QueryPolicy) -> Self {
        self.query_policy = Some(policy);
        self
    }

    pub fn with_cache_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.cache_root = Some(root.into());
        self
    }

    pub fn with_tls_lenient(mut self, lenient: bool) -> Self {
        self.tls_lenient = Some(lenient);
        self
    }
}
