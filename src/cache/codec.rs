//! Path/Key Codec Module
//!
//! Turns a URL into its canonical cache identity and a filesystem-safe
//! location: `<cache_root>/<host_bucket>/<digest>.<ext>`.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use url::Url;

use crate::cache::QueryPolicy;
use crate::error::{CacheError, Result};

// == Constants ==
/// Extensions kept as-is in the cache file name; anything else becomes `jpg`.
pub const IMAGE_TYPES: [&str; 7] = ["png", "jpeg", "jpg", "gif", "bmp", "tiff", "tif"];

/// Extension used when the URL has none or an unknown one.
pub const DEFAULT_IMAGE_TYPE: &str = "jpg";

// == Cache Key ==
/// Hashed, fixed-length cache file name plus its image-type suffix.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    digest: String,
    extension: &'static str,
}

impl CacheKey {
    /// Hex digest part of the key.
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Image-type suffix, always one of [`IMAGE_TYPES`].
    pub fn extension(&self) -> &'static str {
        self.extension
    }

    /// File name on disk: `<digest>.<extension>`.
    pub fn file_name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.digest, self.extension)
    }
}

// == Cacheability ==
/// Returns true iff `url` has an `http://` or `https://` scheme
/// (case-insensitive) and parses with a host.
pub fn is_cacheable(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    if !(lower.starts_with("http://") || lower.starts_with("https://")) {
        return false;
    }
    Url::parse(url)
        .map(|parsed| parsed.host_str().is_some_and(|host| !host.is_empty()))
        .unwrap_or(false)
}

fn parse_cacheable(url: &str) -> Result<Url> {
    if !is_cacheable(url) {
        return Err(CacheError::NotCacheable(url.to_string()));
    }
    Url::parse(url).map_err(|_| CacheError::NotCacheable(url.to_string()))
}

// == Normalization ==
/// Canonicalizes `url` under `policy`.
///
/// The fragment is dropped. With `Flag(false)` the query is removed, with
/// `Flag(true)` it is kept verbatim, with `Only(names)` only matching
/// parameters are kept in their original order.
pub fn normalize_for_key(url: &str, policy: &QueryPolicy) -> Result<String> {
    let mut parsed = parse_cacheable(url)?;
    parsed.set_fragment(None);

    match policy {
        QueryPolicy::Flag(true) => {}
        QueryPolicy::Flag(false) => parsed.set_query(None),
        QueryPolicy::Only(_) => {
            let kept: Vec<(String, String)> = parsed
                .query_pairs()
                .filter(|(name, _)| policy.retains(name))
                .map(|(name, value)| (name.into_owned(), value.into_owned()))
                .collect();
            if kept.is_empty() {
                parsed.set_query(None);
            } else {
                parsed.query_pairs_mut().clear().extend_pairs(kept);
            }
        }
    }

    Ok(parsed.to_string())
}

// == Key Derivation ==
/// Derives the cache key for an already canonical URL.
///
/// Every query parameter still present takes part: values are ordered by
/// parameter name (first occurrence wins) and joined with commas.
pub fn derive_key(canonical_url: &str) -> Result<CacheKey> {
    let parsed = parse_cacheable(canonical_url)?;

    let path = parsed.path();
    let (dir, file_name) = path.rsplit_once('/').unwrap_or(("", path));

    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .and_then(|ext| IMAGE_TYPES.iter().copied().find(|known| *known == ext))
        .unwrap_or(DEFAULT_IMAGE_TYPE);

    let mut params: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in parsed.query_pairs() {
        params
            .entry(name.into_owned())
            .or_insert_with(|| value.into_owned());
    }
    let query_values = params.into_values().collect::<Vec<_>>().join(",");

    let material = format!("{dir}{file_name}{extension}{query_values}");
    Ok(CacheKey {
        digest: sha256_hex(material.as_bytes()),
        extension,
    })
}

// == Host Bucket ==
/// Filesystem-safe, collision-resistant directory name for the URL's host.
pub fn host_bucket(url: &str) -> Result<String> {
    let parsed = parse_cacheable(url)?;
    let host = match (parsed.host_str(), parsed.port()) {
        (Some(host), Some(port)) => format!("{host}:{port}"),
        (Some(host), None) => host.to_string(),
        (None, _) => return Err(CacheError::NotCacheable(url.to_string())),
    };

    let sanitized: String = host
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();

    Ok(format!("{}_{}", sanitized, sha256_hex(host.as_bytes())))
}

// == Paths ==
/// Path relative to the cache root, with `/` separators; this is what
/// the index stores.
pub fn relative_path(canonical_url: &str) -> Result<String> {
    Ok(format!(
        "{}/{}",
        host_bucket(canonical_url)?,
        derive_key(canonical_url)?
    ))
}

/// Absolute location of the cache file for `canonical_url` under `cache_root`.
pub fn resolve_path(canonical_url: &str, cache_root: &Path) -> Result<PathBuf> {
    Ok(cache_root
        .join(host_bucket(canonical_url)?)
        .join(derive_key(canonical_url)?.file_name()))
}

/// Joins an index-stored relative path onto `cache_root`.
pub fn join_relative(cache_root: &Path, relative: &str) -> PathBuf {
    relative
        .split('/')
        .filter(|part| !part.is_empty())
        .fold(cache_root.to_path_buf(), |acc, part| acc.join(part))
}

fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}
