//! Shared helpers for integration tests
//!
//! Provides an in-process transport that counts calls instead of touching
//! the network.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicU16, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use image_cache::cache::{CacheEngine, CacheOptions, TransferOutcome, Transport};
use image_cache::index::{CacheIndex, MemoryIndex};
use image_cache::Result;
use parking_lot::Mutex;

// == Counting Transport ==
/// Transport that writes a fixed body and records every call.
pub struct CountingTransport {
    calls: AtomicUsize,
    status: AtomicU16,
    body: Vec<u8>,
    /// Announced size, when it should differ from the body
    content_length: Mutex<Option<u64>>,
    delay: Duration,
    last_headers: Mutex<BTreeMap<String, String>>,
}

impl CountingTransport {
    pub fn new(body: &[u8]) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            status: AtomicU16::new(200),
            body: body.to_vec(),
            content_length: Mutex::new(None),
            delay: Duration::ZERO,
            last_headers: Mutex::new(BTreeMap::new()),
        }
    }

    /// Makes every download take at least `delay`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_status(&self, status: u16) {
        self.status.store(status, Ordering::SeqCst);
    }

    pub fn announce_length(&self, length: Option<u64>) {
        *self.content_length.lock() = length;
    }

    pub fn last_headers(&self) -> BTreeMap<String, String> {
        self.last_headers.lock().clone()
    }
}

#[async_trait]
impl Transport for CountingTransport {
    async fn download(
        &self,
        _url: &str,
        to_file: &Path,
        headers: &BTreeMap<String, String>,
        _tls_lenient: bool,
    ) -> Result<TransferOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_headers.lock() = headers.clone();

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let status = self.status.load(Ordering::SeqCst);
        if !(200..300).contains(&status) {
            return Ok(TransferOutcome {
                status,
                content_length: None,
                bytes_written: 0,
            });
        }

        tokio::fs::write(to_file, &self.body).await.unwrap();
        let written = self.body.len() as u64;
        Ok(TransferOutcome {
            status,
            content_length: Some(self.content_length.lock().unwrap_or(written)),
            bytes_written: written,
        })
    }
}

// == Builders ==
/// Engine rooted at `root`, backed by `transport` and a fresh index.
pub fn engine_with(
    root: &Path,
    transport: Arc<CountingTransport>,
) -> (CacheEngine, Arc<MemoryIndex>) {
    let index = Arc::new(MemoryIndex::new());
    let options = CacheOptions {
        cache_root: root.to_path_buf(),
        ..CacheOptions::default()
    };
    let engine = CacheEngine::with_transport(
        options,
        transport as Arc<dyn Transport>,
        index.clone() as Arc<dyn CacheIndex>,
    );
    (engine, index)
}
