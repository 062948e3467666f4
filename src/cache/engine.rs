//! Cache Engine Module
//!
//! Ties the codec, file operations, in-flight registry and index together
//! into get-or-fetch, seed, delete, clear and inspect operations.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::cache::codec;
use crate::cache::file_ops::{CacheInfo, FileOps};
use crate::cache::inflight::InFlightDownloads;
use crate::cache::transport::{HttpTransport, Transport};
use crate::cache::{CacheOptions, CacheOverrides, EngineStats};
use crate::error::{CacheError, Result};
use crate::index::CacheIndex;

// == Cache Engine ==
/// Cache engine handle. Cheap to clone; clones share the index, the
/// in-flight registry and the statistics.
#[derive(Clone)]
pub struct CacheEngine {
    files: FileOps,
    index: Arc<dyn CacheIndex>,
    inflight: InFlightDownloads,
    defaults: Arc<CacheOptions>,
    stats: Arc<Mutex<EngineStats>>,
}

impl std::fmt::Debug for CacheEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheEngine")
            .field("defaults", &self.defaults)
            .field("inflight", &self.inflight)
            .finish_non_exhaustive()
    }
}

impl CacheEngine {
    // == Constructors ==
    /// Creates an engine with its own in-flight registry.
    pub fn new(defaults: CacheOptions, files: FileOps, index: Arc<dyn CacheIndex>) -> Self {
        Self {
            files,
            index,
            inflight: InFlightDownloads::new(),
            defaults: Arc::new(defaults),
            stats: Arc::new(Mutex::new(EngineStats::new())),
        }
    }

    /// Creates an engine that downloads with `transport` onto the local disk.
    pub fn with_transport(
        defaults: CacheOptions,
        transport: Arc<dyn Transport>,
        index: Arc<dyn CacheIndex>,
    ) -> Self {
        Self::new(defaults, FileOps::with_transport(transport), index)
    }

    /// Creates an engine that downloads over HTTP(S) onto the local disk.
    pub fn http(defaults: CacheOptions, index: Arc<dyn CacheIndex>) -> Result<Self> {
        Ok(Self::with_transport(
            defaults,
            Arc::new(HttpTransport::new()?),
            index,
        ))
    }

    /// Shares `inflight` with other engines instead of a private registry.
    pub fn with_inflight(mut self, inflight: InFlightDownloads) -> Self {
        self.inflight = inflight;
        self
    }

    // == Accessors ==
    /// Instance options every call starts from.
    pub fn options(&self) -> &CacheOptions {
        &self.defaults
    }

    /// Instance options with `overrides` applied.
    pub fn resolve_options(&self, overrides: &CacheOverrides) -> CacheOptions {
        self.defaults.merge(overrides)
    }

    pub fn inflight(&self) -> &InFlightDownloads {
        &self.inflight
    }

    pub fn files(&self) -> &FileOps {
        &self.files
    }

    /// Snapshot of the lookup and populate counters.
    pub fn stats(&self) -> EngineStats {
        self.stats.lock().clone()
    }

    /// Absolute cache location `url` maps to, without fetching anything.
    pub fn cache_path(&self, url: &str, overrides: &CacheOverrides) -> Result<PathBuf> {
        let options = self.resolve_options(overrides);
        let canonical = codec::normalize_for_key(url, &options.query_policy)?;
        codec::resolve_path(&canonical, &options.cache_root)
    }

    /// Cached file for `url` if the index holds a live entry and the file is
    /// on disk. Never fetches and leaves the statistics alone.
    pub async fn lookup(&self, url: &str, overrides: &CacheOverrides) -> Result<Option<PathBuf>> {
        if !codec::is_cacheable(url) {
            return Err(CacheError::NotCacheable(url.to_string()));
        }

        let options = self.resolve_options(overrides);
        let canonical = codec::normalize_for_key(url, &options.query_policy)?;

        match self.index.get(&canonical).await? {
            Some(stored) => {
                let cached = codec::join_relative(&options.cache_root, &stored);
                if self.files.exists(&cached).await? {
                    Ok(Some(cached))
                } else {
                    Ok(None)
                }
            }
            None => Ok(None),
        }
    }

    // == Get Or Fetch ==
    /// Returns the cached file for `url`, populating it first if the index
    /// has no live entry or the file it names is gone.
    ///
    /// `populate` receives the destination path and must leave the file
    /// there. It runs at most once per destination at a time; concurrent
    /// callers share its outcome. Any file already at the destination is
    /// deleted before `populate` runs, and the index is only updated when
    /// it succeeds.
    pub async fn get_or_fetch<P, Fut>(
        &self,
        url: &str,
        options: &CacheOptions,
        populate: P,
    ) -> Result<PathBuf>
    where
        P: FnOnce(PathBuf) -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        if !codec::is_cacheable(url) {
            return Err(CacheError::NotCacheable(url.to_string()));
        }

        let canonical = codec::normalize_for_key(url, &options.query_policy)?;
        let relative = codec::relative_path(&canonical)?;
        let destination = codec::join_relative(&options.cache_root, &relative);

        match self.index.get(&canonical).await? {
            Some(stored) => {
                let cached = codec::join_relative(&options.cache_root, &stored);
                if self.files.exists(&cached).await? {
                    debug!(url = %canonical, path = %cached.display(), "Cache hit");
                    self.stats.lock().record_hit();
                    return Ok(cached);
                }
                debug!(url = %canonical, path = %cached.display(), "Index entry points at a missing file");
                self.stats.lock().record_stale();
            }
            None => {
                debug!(url = %canonical, "Cache miss");
                self.stats.lock().record_miss();
            }
        }

        let files = self.files.clone();
        let index = Arc::clone(&self.index);
        let stats = Arc::clone(&self.stats);
        let ttl_secs = options.ttl_secs;
        let target = destination.clone();

        let operation = async move {
            let outcome = async {
                files.delete(&target).await?;
                populate(target.clone()).await?;
                index.set(&canonical, &relative, ttl_secs).await
            }
            .await;

            match outcome {
                Ok(()) => {
                    stats.lock().record_population();
                    info!(url = %canonical, path = %target.display(), "Cached");
                    Ok(target)
                }
                Err(e) => {
                    stats.lock().record_failure();
                    warn!(url = %canonical, error = %e, "Populate failed");
                    Err(e)
                }
            }
        };

        self.inflight.acquire(destination, operation).await
    }

    // == Download And Cache ==
    /// Downloads `url` into the cache unless a live copy is already there.
    pub async fn download_and_cache_url(
        &self,
        url: &str,
        overrides: &CacheOverrides,
    ) -> Result<PathBuf> {
        let options = self.resolve_options(overrides);
        let files = self.files.clone();
        let source = url.to_string();
        let headers = options.headers.clone();
        let tls_lenient = options.tls_lenient;

        self.get_or_fetch(url, &options, move |path| async move {
            files
                .download(&source, &path, &headers, tls_lenient)
                .await
                .map(|_| ())
        })
        .await
    }

    // == Seed And Cache ==
    /// Registers a local file as the cached copy of `url`, unless a live
    /// copy is already there.
    pub async fn seed_and_cache_url(
        &self,
        url: &str,
        seed_path: impl AsRef<Path>,
        overrides: &CacheOverrides,
    ) -> Result<PathBuf> {
        let options = self.resolve_options(overrides);
        let files = self.files.clone();
        let seed = seed_path.as_ref().to_path_buf();

        self.get_or_fetch(url, &options, move |path| async move {
            files.copy(&seed, &path).await.map(|_| ())
        })
        .await
    }

    // == Delete ==
    /// Removes the index entry and the cached file for `url`. Deleting
    /// something that is not cached is not an error.
    pub async fn delete_url(&self, url: &str, overrides: &CacheOverrides) -> Result<()> {
        if !codec::is_cacheable(url) {
            return Err(CacheError::NotCacheable(url.to_string()));
        }

        let options = self.resolve_options(overrides);
        let canonical = codec::normalize_for_key(url, &options.query_policy)?;
        let path = codec::resolve_path(&canonical, &options.cache_root)?;

        self.index.remove(&canonical).await?;
        self.files.delete(&path).await?;

        debug!(url = %canonical, path = %path.display(), "Deleted cache entry");
        Ok(())
    }

    // == Clear ==
    /// Drops every index entry and empties the cache root.
    pub async fn clear_cache(&self, overrides: &CacheOverrides) -> Result<()> {
        let options = self.resolve_options(overrides);

        self.index.flush().await?;
        self.files.clean_dir(&options.cache_root).await?;

        info!(root = %options.cache_root.display(), "Cache cleared");
        Ok(())
    }

    // == Info ==
    /// Lists everything under the cache root with the total file size.
    pub async fn cache_info(&self, overrides: &CacheOverrides) -> Result<CacheInfo> {
        let options = self.resolve_options(overrides);
        self.files.stat_tree(&options.cache_root).await
    }

    // == Maintenance ==
    /// Drops expired index entries and deletes their leftover files under
    /// the instance cache root. Returns the number of entries dropped.
    pub async fn sweep_expired(&self) -> Result<usize> {
        let expired = self.index.sweep().await?;

        for entry in &expired {
            let path = codec::join_relative(&self.defaults.cache_root, &entry.relative_path);
            // a fresh populate may already be rewriting this file
            if self.inflight.contains(&path) {
                continue;
            }
            if let Err(e) = self.files.delete(&path).await {
                warn!(path = %path.display(), error = %e, "Failed to remove expired cache file");
            }
        }

        Ok(expired.len())
    }

    /// Writes the index to durable storage, if it has any.
    pub async fn persist_index(&self) -> Result<()> {
        self.index.persist().await
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::transport::TransferOutcome;
    use crate::index::MemoryIndex;
    use async_trait::async_trait;
    use std::collections::BTreeMap;

    struct UnreachableTransport;

    #[async_trait]
    impl Transport for UnreachableTransport {
        async fn download(
            &self,
            url: &str,
            _to_file: &Path,
            _headers: &BTreeMap<String, String>,
            _tls_lenient: bool,
        ) -> Result<TransferOutcome> {
            panic!("unexpected download of {url}");
        }
    }

    fn engine(root: &Path) -> (CacheEngine, Arc<MemoryIndex>) {
        let index = Arc::new(MemoryIndex::new());
        let options = CacheOptions {
            cache_root: root.to_path_buf(),
            ..CacheOptions::default()
        };
        let engine = CacheEngine::with_transport(
            options,
            Arc::new(UnreachableTransport),
            index.clone() as Arc<dyn CacheIndex>,
        );
        (engine, index)
    }

    #[tokio::test]
    async fn test_uncacheable_rejected_without_side_effects() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("cache");
        let (engine, index) = engine(&root);

        for url in ["", "ftp://h/a.png", "/tmp/a.png", "data:image/png;base64,AA"] {
            let result = engine
                .download_and_cache_url(url, &CacheOverrides::default())
                .await;
            assert!(matches!(result, Err(CacheError::NotCacheable(_))));
        }
        let result = engine.delete_url("file:///x", &CacheOverrides::default()).await;
        assert!(matches!(result, Err(CacheError::NotCacheable(_))));

        assert!(!root.exists());
        assert!(index.is_empty().await);
        assert_eq!(engine.stats().lookups(), 0);
    }

    #[tokio::test]
    async fn test_seed_registers_relative_path() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("cache");
        let seed = dir.path().join("seed.png");
        tokio::fs::write(&seed, b"png").await.unwrap();
        let (engine, index) = engine(&root);

        let path = engine
            .seed_and_cache_url("https://h.com/a.png?x=1", &seed, &CacheOverrides::default())
            .await
            .unwrap();

        assert!(path.starts_with(&root));
        let stored = index.get("https://h.com/a.png").await.unwrap().unwrap();
        assert_eq!(codec::join_relative(&root, &stored), path);
        assert_eq!(
            path,
            engine
                .cache_path("https://h.com/a.png", &CacheOverrides::default())
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_sweep_removes_leftover_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("cache");
        let seed = dir.path().join("seed.jpg");
        tokio::fs::write(&seed, b"jpg").await.unwrap();
        let (engine, index) = engine(&root);

        let overrides = CacheOverrides::default().with_ttl_secs(0);
        let path = engine
            .seed_and_cache_url("https://h.com/b.jpg", &seed, &overrides)
            .await
            .unwrap();
        assert!(path.exists());

        assert_eq!(engine.sweep_expired().await.unwrap(), 1);
        assert!(!path.exists());
        assert!(index.is_empty().await);
    }
}
