//! Request DTOs for the image cache API
//!
//! Defines the structure of incoming HTTP request bodies.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::cache::{CacheOverrides, QueryPolicy};

/// Per-request options a client may set.
///
/// The cache root and TLS policy stay with the daemon configuration;
/// unknown fields are rejected.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RequestOptions {
    pub headers: Option<BTreeMap<String, String>>,
    pub ttl_secs: Option<u64>,
    pub query_policy: Option<QueryPolicy>,
}

impl RequestOptions {
    pub fn to_overrides(&self) -> CacheOverrides {
        CacheOverrides {
            headers: self.headers.clone(),
            ttl_secs: self.ttl_secs,
            query_policy: self.query_policy.clone(),
            ..CacheOverrides::default()
        }
    }
}

/// Request body for POST /cache/download
#[derive(Debug, Clone, Deserialize)]
pub struct DownloadRequest {
    /// Remote image URL
    pub url: String,
    /// Per-call option overrides
    #[serde(default)]
    pub options: RequestOptions,
}

/// Request body for POST /cache/seed
#[derive(Debug, Clone, Deserialize)]
pub struct SeedRequest {
    /// URL the local file is registered under
    pub url: String,
    /// File inside the daemon's seed directory, absolute or relative to it
    pub seed_path: PathBuf,
    #[serde(default)]
    pub options: RequestOptions,
}

impl SeedRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.seed_path.as_os_str().is_empty() {
            return Some("seed_path cannot be empty".to_string());
        }
        None
    }
}

/// Request body for DELETE /cache/entry
#[derive(Debug, Clone, Deserialize)]
pub struct DeleteRequest {
    pub url: String,
    #[serde(default)]
    pub options: RequestOptions,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_request_deserialize() {
        let json = r#"{"url": "https://h.com/a.png"}"#;
        let req: DownloadRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.url, "https://h.com/a.png");
        assert_eq!(req.options, RequestOptions::default());
        assert_eq!(req.options.to_overrides(), CacheOverrides::default());
    }

    #[test]
    fn test_download_request_with_options() {
        let json = r#"{
            "url": "https://h.com/a.png?w=1",
            "options": {"ttl_secs": 60, "query_policy": ["w"], "headers": {"x-token": "t"}}
        }"#;
        let req: DownloadRequest = serde_json::from_str(json).unwrap();
        let overrides = req.options.to_overrides();
        assert_eq!(overrides.ttl_secs, Some(60));
        assert_eq!(overrides.query_policy, Some(QueryPolicy::only(["w"])));
        assert_eq!(
            overrides.headers.unwrap().get("x-token").map(String::as_str),
            Some("t")
        );
        assert!(overrides.cache_root.is_none());
    }

    #[test]
    fn test_download_request_rejects_cache_root() {
        let json = r#"{"url": "https://h.com/a.png", "options": {"cache_root": "/etc"}}"#;
        assert!(serde_json::from_str::<DownloadRequest>(json).is_err());

        let json = r#"{"url": "https://h.com/a.png", "options": {"tls_lenient": false}}"#;
        assert!(serde_json::from_str::<DownloadRequest>(json).is_err());
    }

    #[test]
    fn test_download_request_rejects_non_string_url() {
        let json = r#"{"url": 42}"#;
        assert!(serde_json::from_str::<DownloadRequest>(json).is_err());
    }

    #[test]
    fn test_seed_request_validate() {
        let req = SeedRequest {
            url: "https://h.com/a.png".to_string(),
            seed_path: PathBuf::new(),
            options: RequestOptions::default(),
        };
        assert!(req.validate().is_some());

        let req = SeedRequest {
            seed_path: PathBuf::from("a.png"),
            ..req
        };
        assert!(req.validate().is_none());
    }
}
