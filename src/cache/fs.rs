//! Filesystem Capability Module
//!
//! The narrow set of raw filesystem primitives the cache consumes, plus a
//! `tokio::fs` implementation.

use std::ffi::OsString;
use std::io;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::fs;

// == File Stat ==
/// Metadata for one filesystem entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStat {
    pub is_file: bool,
    pub is_dir: bool,
    /// Size in bytes
    pub size: u64,
    /// Unix permission bits (0o444/0o644 approximation off Unix)
    pub mode: u32,
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
}

impl From<std::fs::Metadata> for FileStat {
    fn from(meta: std::fs::Metadata) -> Self {
        Self {
            is_file: meta.is_file(),
            is_dir: meta.is_dir(),
            size: meta.len(),
            mode: permission_bits(&meta),
            created: meta.created().ok().map(DateTime::<Utc>::from),
            modified: meta.modified().ok().map(DateTime::<Utc>::from),
        }
    }
}

#[cfg(unix)]
fn permission_bits(meta: &std::fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode()
}

#[cfg(not(unix))]
fn permission_bits(meta: &std::fs::Metadata) -> u32 {
    if meta.permissions().readonly() {
        0o444
    } else {
        0o644
    }
}

// == File System Trait ==
/// Raw filesystem primitives. Errors keep their `io::ErrorKind` so callers
/// can classify them.
#[async_trait]
pub trait FileSystem: Send + Sync {
    async fn exists(&self, path: &Path) -> io::Result<bool>;

    /// Creates `path` and any missing parents.
    async fn mkdir(&self, path: &Path) -> io::Result<()>;

    async fn stat(&self, path: &Path) -> io::Result<FileStat>;

    /// Names of the direct children of `path`.
    async fn read_dir(&self, path: &Path) -> io::Result<Vec<OsString>>;

    /// Removes a single file.
    async fn unlink(&self, path: &Path) -> io::Result<()>;

    async fn remove_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Copies bytes, returning the number copied.
    async fn copy(&self, from: &Path, to: &Path) -> io::Result<u64>;

    /// Moves `from` to `to`, replacing `to` if it exists.
    async fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;
}

// == Tokio Implementation ==
/// [`FileSystem`] backed by `tokio::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioFs;

#[async_trait]
impl FileSystem for TokioFs {
    async fn exists(&self, path: &Path) -> io::Result<bool> {
        fs::try_exists(path).await
    }

    async fn mkdir(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path).await
    }

    async fn stat(&self, path: &Path) -> io::Result<FileStat> {
        fs::metadata(path).await.map(FileStat::from)
    }

    async fn read_dir(&self, path: &Path) -> io::Result<Vec<OsString>> {
        let mut reader = fs::read_dir(path).await?;
        let mut names = Vec::new();
        while let Some(entry) = reader.next_entry().await? {
            names.push(entry.file_name());
        }
        names.sort();
        Ok(names)
    }

    async fn unlink(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path).await
    }

    async fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::remove_dir_all(path).await
    }

    async fn copy(&self, from: &Path, to: &Path) -> io::Result<u64> {
        fs::copy(from, to).await
    }

    async fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to).await
    }
}
