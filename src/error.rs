//! Error types for the image cache
//!
//! Provides unified error handling using thiserror.

use std::io;
use std::path::Path;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the image cache.
///
/// The error is `Clone` because one populate outcome is handed to every
/// caller that was coalesced onto the same in-flight download.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// URL is not an http(s) URL or cannot be parsed
    #[error("Url is not cacheable: {0}")]
    NotCacheable(String),

    /// Transfer failed, returned a bad status, or was truncated
    #[error("Download failed: {0}")]
    Download(String),

    /// Directory creation, copy, move or delete failed
    #[error("Filesystem error: {0}")]
    Filesystem(String),

    /// Expected directory does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller passed an unusable argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Populate task panicked or was aborted
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CacheError {
    /// Wraps an I/O failure on `path`, keeping the error kind in the message.
    pub fn filesystem(action: &str, path: &Path, err: io::Error) -> Self {
        CacheError::Filesystem(format!(
            "{} '{}' failed ({:?}): {}",
            action,
            path.display(),
            err.kind(),
            err
        ))
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::NotCacheable(_) => StatusCode::BAD_REQUEST,
            CacheError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::Download(_) => StatusCode::BAD_GATEWAY,
            CacheError::Filesystem(_) => StatusCode::INTERNAL_SERVER_ERROR,
            CacheError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the image cache.
pub type Result<T> = std::result::Result<T, CacheError>;
