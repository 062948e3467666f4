//! Resolved Paths Overlay
//!
//! Remembers URLs already resolved to cache files so repeat lookups skip
//! the get-or-fetch path while the index still vouches for them.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::cache::{is_cacheable, CacheEngine, CacheOverrides};
use crate::error::{CacheError, Result};

// == Resolved Paths ==
/// URL -> absolute cache path map. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct ResolvedPaths {
    loaded: Arc<RwLock<HashMap<String, PathBuf>>>,
}

impl ResolvedPaths {
    pub fn new() -> Self {
        Self::default()
    }

    /// Path previously remembered for `url`.
    pub fn get_cached(&self, url: &str) -> Result<Option<PathBuf>> {
        if url.is_empty() {
            return Err(CacheError::InvalidArgument("url must not be empty".into()));
        }
        Ok(self.loaded.read().get(url).cloned())
    }

    /// Remembers `cached_path` as the resolution of `url`.
    pub fn set_cached(&self, url: &str, cached_path: impl AsRef<Path>) -> Result<()> {
        if url.is_empty() {
            return Err(CacheError::InvalidArgument("url must not be empty".into()));
        }
        let cached_path = cached_path.as_ref();
        if cached_path.as_os_str().is_empty() {
            return Err(CacheError::InvalidArgument(
                "cached path must not be empty".into(),
            ));
        }
        self.loaded
            .write()
            .insert(url.to_string(), cached_path.to_path_buf());
        Ok(())
    }

    /// Forgets `url`.
    pub fn forget(&self, url: &str) {
        self.loaded.write().remove(url);
    }

    /// Forgets every URL.
    pub fn clear(&self) {
        self.loaded.write().clear();
    }

    pub fn len(&self) -> usize {
        self.loaded.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.loaded.read().is_empty()
    }
}

// == Cached Resolver ==
/// An engine paired with an overlay of already resolved URLs.
#[derive(Debug, Clone)]
pub struct CachedResolver {
    engine: CacheEngine,
    overlay: ResolvedPaths,
}

impl CachedResolver {
    pub fn new(engine: CacheEngine, overlay: ResolvedPaths) -> Self {
        Self { engine, overlay }
    }

    pub fn engine(&self) -> &CacheEngine {
        &self.engine
    }

    pub fn overlay(&self) -> &ResolvedPaths {
        &self.overlay
    }

    /// Serves a remembered path while it is still what `overrides` map `url`
    /// to and the index holds a live entry for it. Otherwise goes through
    /// [`CacheEngine::download_and_cache_url`] and remembers the result.
    pub async fn resolve(&self, url: &str, overrides: &CacheOverrides) -> Result<PathBuf> {
        if !is_cacheable(url) {
            return Err(CacheError::NotCacheable(url.to_string()));
        }

        if let Some(remembered) = self.overlay.get_cached(url)? {
            let expected = self.engine.cache_path(url, overrides)?;
            if remembered == expected {
                match self.engine.lookup(url, overrides).await? {
                    Some(live) if live == remembered => {
                        debug!(url, "Served from resolved overlay");
                        return Ok(live);
                    }
                    // expired or gone from disk
                    _ => self.overlay.forget(url),
                }
            }
        }

        let path = self.engine.download_and_cache_url(url, overrides).await?;
        self.overlay.set_cached(url, &path)?;
        Ok(path)
    }

    /// Deletes `url` from the cache and the overlay.
    pub async fn delete(&self, url: &str, overrides: &CacheOverrides) -> Result<()> {
        self.overlay.forget(url);
        self.engine.delete_url(url, overrides).await
    }

    /// Clears the cache and the overlay.
    pub async fn clear(&self, overrides: &CacheOverrides) -> Result<()> {
        self.overlay.clear();
        self.engine.clear_cache(overrides).await
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_and_set_cached() {
        let overlay = ResolvedPaths::new();
        assert!(overlay.get_cached("https://h/a.png").unwrap().is_none());

        overlay.set_cached("https://h/a.png", "/cache/h/k.png").unwrap();
        assert_eq!(
            overlay.get_cached("https://h/a.png").unwrap(),
            Some(PathBuf::from("/cache/h/k.png"))
        );
        assert_eq!(overlay.len(), 1);
    }

    #[test]
    fn test_empty_arguments_rejected() {
        let overlay = ResolvedPaths::new();
        assert!(matches!(
            overlay.get_cached(""),
            Err(CacheError::InvalidArgument(_))
        ));
        assert!(matches!(
            overlay.set_cached("", "/x"),
            Err(CacheError::InvalidArgument(_))
        ));
        assert!(matches!(
            overlay.set_cached("https://h/a.png", ""),
            Err(CacheError::InvalidArgument(_))
        ));
        assert!(overlay.is_empty());
    }

    #[test]
    fn test_clones_share_state() {
        let overlay = ResolvedPaths::new();
        let other = overlay.clone();
        other.set_cached("https://h/a.png", "/c/k.png").unwrap();
        assert_eq!(overlay.len(), 1);

        overlay.forget("https://h/a.png");
        assert!(other.is_empty());
    }
}
