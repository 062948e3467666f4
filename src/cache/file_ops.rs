//! File Operations Module
//!
//! Directory management, download-then-move, copy, delete and recursive
//! stat built on top of the [`FileSystem`] and [`Transport`] capabilities.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::cache::fs::{FileSystem, TokioFs};
use crate::cache::transport::Transport;
use crate::error::{CacheError, Result};

// == Constants ==
/// Suffix of the sibling file a download is written to before promotion.
pub const TEMP_SUFFIX: &str = ".tmp";

/// Returns `destination` with [`TEMP_SUFFIX`] appended to its file name.
pub fn temp_path(destination: &Path) -> PathBuf {
    let mut name = destination.as_os_str().to_os_string();
    name.push(TEMP_SUFFIX);
    PathBuf::from(name)
}

// == Stat Types ==
/// Kind of an entry reported by [`FileOps::stat_tree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

/// One entry of a cache directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatEntry {
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
    pub mode: u32,
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
    pub kind: EntryKind,
}

/// Flattened recursive listing plus the summed size of all files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheInfo {
    pub entries: Vec<StatEntry>,
    pub total_size: u64,
}

impl CacheInfo {
    /// Number of regular files in the listing.
    pub fn file_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.kind == EntryKind::File)
            .count()
    }
}

// == File Ops ==
/// File operations shared by every cache engine clone.
#[derive(Clone)]
pub struct FileOps {
    fs: Arc<dyn FileSystem>,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for FileOps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileOps").finish_non_exhaustive()
    }
}

impl FileOps {
    // == Constructor ==
    pub fn new(fs: Arc<dyn FileSystem>, transport: Arc<dyn Transport>) -> Self {
        Self { fs, transport }
    }

    /// File operations on the local disk via `tokio::fs`.
    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        Self::new(Arc::new(TokioFs), transport)
    }

    // == Exists ==
    pub async fn exists(&self, path: &Path) -> Result<bool> {
        self.fs
            .exists(path)
            .await
            .map_err(|e| CacheError::filesystem("exists", path, e))
    }

    // == Ensure Directory ==
    /// Creates `dir` and its parents.
    ///
    /// `AlreadyExists` is accepted only if `dir` really is a directory, which
    /// covers concurrent creation races without hiding a file in the way.
    pub async fn ensure_dir(&self, dir: &Path) -> Result<()> {
        match self.fs.mkdir(dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                let is_dir = self.fs.stat(dir).await.map(|s| s.is_dir).unwrap_or(false);
                if !is_dir {
                    return Err(CacheError::filesystem("mkdir", dir, e));
                }
            }
            Err(e) => return Err(CacheError::filesystem("mkdir", dir, e)),
        }

        // some hosts report success on paths they silently refuse to create
        if !self.exists(dir).await? {
            return Err(CacheError::Filesystem(format!(
                "invalid cache location '{}'",
                dir.display()
            )));
        }
        Ok(())
    }

    /// Creates the parent directory chain of the file `path`.
    pub async fn ensure_parent(&self, path: &Path) -> Result<()> {
        match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => self.ensure_dir(parent).await,
            _ => Ok(()),
        }
    }

    // == Download ==
    /// Downloads `url` into a temp sibling of `destination`, verifies the
    /// size, then renames it into place.
    ///
    /// A 304 response succeeds without touching the destination, provided
    /// there is a destination to keep; with nothing on disk it fails with
    /// [`CacheError::Download`]. Any other non-2xx status or a size mismatch
    /// fails the same way. The temp file is discarded and `destination` is
    /// never written.
    pub async fn download(
        &self,
        url: &str,
        destination: &Path,
        headers: &BTreeMap<String, String>,
        tls_lenient: bool,
    ) -> Result<PathBuf> {
        self.ensure_parent(destination).await?;
        let tmp = temp_path(destination);

        let outcome = match self
            .transport
            .download(url, &tmp, headers, tls_lenient)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                self.discard(&tmp).await;
                return Err(e);
            }
        };

        if outcome.is_not_modified() {
            self.discard(&tmp).await;
            if !self.exists(destination).await? {
                return Err(CacheError::Download(format!(
                    "{url} answered 304 but there is no cached copy at '{}'",
                    destination.display()
                )));
            }
            debug!(url, "Server reported 304, keeping destination as is");
            return Ok(destination.to_path_buf());
        }

        if !outcome.is_success() {
            self.discard(&tmp).await;
            return Err(CacheError::Download(format!(
                "cannot download {url}, status code: {}",
                outcome.status
            )));
        }

        let on_disk = match self.fs.stat(&tmp).await {
            Ok(stat) => stat.size,
            Err(e) => {
                self.discard(&tmp).await;
                return Err(CacheError::filesystem("stat", &tmp, e));
            }
        };
        let expected = outcome.content_length.unwrap_or(outcome.bytes_written);
        if on_disk != expected {
            self.discard(&tmp).await;
            return Err(CacheError::Download(format!(
                "{url} could not be fully downloaded: expected {expected} bytes, got {on_disk}"
            )));
        }

        self.fs
            .rename(&tmp, destination)
            .await
            .map_err(|e| CacheError::filesystem("move", &tmp, e))?;

        debug!(url, path = %destination.display(), bytes = on_disk, "Download promoted");
        Ok(destination.to_path_buf())
    }

    // == Copy ==
    /// Copies `source` to `destination`, creating the destination directory.
    pub async fn copy(&self, source: &Path, destination: &Path) -> Result<PathBuf> {
        self.ensure_parent(destination).await?;
        self.fs
            .copy(source, destination)
            .await
            .map_err(|e| CacheError::filesystem("copy", source, e))?;
        Ok(destination.to_path_buf())
    }

    // == Delete ==
    /// Removes `path` if it is a regular file; anything else is a no-op.
    pub async fn delete(&self, path: &Path) -> Result<()> {
        match self.fs.stat(path).await {
            Ok(stat) if stat.is_file => self
                .fs
                .unlink(path)
                .await
                .or_else(|e| match e.kind() {
                    io::ErrorKind::NotFound => Ok(()),
                    _ => Err(e),
                })
                .map_err(|e| CacheError::filesystem("delete", path, e)),
            Ok(_) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CacheError::filesystem("stat", path, e)),
        }
    }

    async fn discard(&self, tmp: &Path) {
        if let Err(e) = self.delete(tmp).await {
            warn!(path = %tmp.display(), error = %e, "Failed to discard temp file");
        }
    }

    // == Clean Directory ==
    /// Removes `dir` recursively if present and recreates it empty.
    pub async fn clean_dir(&self, dir: &Path) -> Result<()> {
        match self.fs.stat(dir).await {
            Ok(stat) if stat.is_dir => self
                .fs
                .remove_dir_all(dir)
                .await
                .map_err(|e| CacheError::filesystem("remove", dir, e))?,
            Ok(_) => {
                return Err(CacheError::Filesystem(format!(
                    "'{}' is not a directory",
                    dir.display()
                )))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(CacheError::filesystem("stat", dir, e)),
        }
        self.ensure_dir(dir).await
    }

    // == Stat Tree ==
    /// Walks `dir` recursively and returns every entry below it with the
    /// total size of the files. Entries are ordered by path.
    pub async fn stat_tree(&self, dir: &Path) -> Result<CacheInfo> {
        match self.fs.stat(dir).await {
            Ok(stat) if stat.is_dir => {}
            Ok(_) => {
                return Err(CacheError::NotFound(format!(
                    "'{}' is not a directory",
                    dir.display()
                )))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(CacheError::NotFound(format!(
                    "directory '{}' does not exist",
                    dir.display()
                )))
            }
            Err(e) => return Err(CacheError::filesystem("stat", dir, e)),
        }

        let mut info = CacheInfo::default();
        let mut pending = vec![dir.to_path_buf()];

        while let Some(current) = pending.pop() {
            let names = self
                .fs
                .read_dir(&current)
                .await
                .map_err(|e| CacheError::filesystem("read_dir", &current, e))?;

            for name in names {
                let path = current.join(&name);
                let stat = match self.fs.stat(&path).await {
                    Ok(stat) => stat,
                    // removed between read_dir and stat
                    Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                    Err(e) => return Err(CacheError::filesystem("stat", &path, e)),
                };

                let kind = if stat.is_dir {
                    pending.push(path.clone());
                    EntryKind::Directory
                } else {
                    info.total_size += stat.size;
                    EntryKind::File
                };

                info.entries.push(StatEntry {
                    name: name.to_string_lossy().into_owned(),
                    path,
                    size: stat.size,
                    mode: stat.mode,
                    created: stat.created,
                    modified: stat.modified,
                    kind,
                });
            }
        }

        info.entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(info)
    }
}
