//! Transport Module
//!
//! Network capability used to pull bytes into a local file.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::{CacheError, Result};

// == Transfer Outcome ==
/// What the remote end reported and what actually landed on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferOutcome {
    /// HTTP status code
    pub status: u16,
    /// Size announced by the server, if any
    pub content_length: Option<u64>,
    /// Bytes written to the target file
    pub bytes_written: u64,
}

impl TransferOutcome {
    /// True for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// True for 304 Not Modified.
    pub fn is_not_modified(&self) -> bool {
        self.status == 304
    }
}

// == Transport Trait ==
/// Fetches `url` into `to_file`.
///
/// Implementations write the body only for 2xx responses and report every
/// other status through [`TransferOutcome::status`] instead of failing;
/// connection-level failures are [`CacheError::Download`].
#[async_trait]
pub trait Transport: Send + Sync {
    async fn download(
        &self,
        url: &str,
        to_file: &Path,
        headers: &BTreeMap<String, String>,
        tls_lenient: bool,
    ) -> Result<TransferOutcome>;
}

// == HTTP Implementation ==
/// [`Transport`] backed by `reqwest`, streaming bodies straight to disk.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    strict: reqwest::Client,
    lenient: reqwest::Client,
}

impl HttpTransport {
    /// Builds one client that verifies certificates and one that does not.
    pub fn new() -> Result<Self> {
        let build = |lenient: bool| {
            reqwest::Client::builder()
                .user_agent(concat!("image_cache/", env!("CARGO_PKG_VERSION")))
                .danger_accept_invalid_certs(lenient)
                .build()
                .map_err(|e| CacheError::Internal(format!("failed to build HTTP client: {e}")))
        };

        Ok(Self {
            strict: build(false)?,
            lenient: build(true)?,
        })
    }

    fn client(&self, tls_lenient: bool) -> &reqwest::Client {
        if tls_lenient {
            &self.lenient
        } else {
            &self.strict
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn download(
        &self,
        url: &str,
        to_file: &Path,
        headers: &BTreeMap<String, String>,
        tls_lenient: bool,
    ) -> Result<TransferOutcome> {
        let mut request = self.client(tls_lenient).get(url);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request
            .send()
            .await
            .map_err(|e| CacheError::Download(format!("request to {url} failed: {e}")))?;

        let status = response.status().as_u16();
        let content_length = response.content_length();

        if !response.status().is_success() {
            debug!(url, status, "Skipping body for non-success response");
            return Ok(TransferOutcome {
                status,
                content_length,
                bytes_written: 0,
            });
        }

        let mut file = tokio::fs::File::create(to_file)
            .await
            .map_err(|e| CacheError::filesystem("create", to_file, e))?;

        let mut bytes_written = 0u64;
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk
                .map_err(|e| CacheError::Download(format!("reading body of {url} failed: {e}")))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| CacheError::filesystem("write", to_file, e))?;
            bytes_written += chunk.len() as u64;
        }

        file.flush()
            .await
            .map_err(|e| CacheError::filesystem("flush", to_file, e))?;

        Ok(TransferOutcome {
            status,
            content_length,
            bytes_written,
        })
    }
}
