//! fsio
//!
//! Filesystem capability set used by file planning and application.
//!
//! # Design
//!
//! Planning reads files to decide whether a change applies; application
//! creates directories and writes contents. Both go through the
//! [`Filesystem`] trait so tests can run against [`MemoryFilesystem`]
//! without touching disk. [`OsFilesystem`] is the production
//! implementation over `tokio::fs`.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use thiserror::Error;

/// Errors from filesystem operations.
#[derive(Debug, Error)]
pub enum FsError {
    /// The path does not exist.
    #[error("not found: {path}")]
    NotFound {
        /// The missing path.
        path: PathBuf,
    },

    /// Any other I/O failure.
    #[error("io error on {path}: {source}")]
    Io {
        /// The path involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
}

impl FsError {
    fn from_io(path: &Path, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            FsError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            FsError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    }

    /// True when the error is a missing path.
    pub fn is_not_found(&self) -> bool {
        matches!(self, FsError::NotFound { .. })
    }
}

/// Filesystem capability set.
#[async_trait]
pub trait Filesystem: Send + Sync {
    /// Read a file as UTF-8.
    async fn read_to_string(&self, path: &Path) -> Result<String, FsError>;

    /// Write a file, optionally applying Unix permission bits.
    async fn write(&self, path: &Path, contents: &str, mode: Option<u32>) -> Result<(), FsError>;

    /// Create a directory and its ancestors.
    async fn mkdir_all(&self, path: &Path) -> Result<(), FsError>;

    /// True when the path exists.
    async fn exists(&self, path: &Path) -> bool;
}

/// Production filesystem over `tokio::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFilesystem;

impl OsFilesystem {
    /// Create the OS filesystem.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Filesystem for OsFilesystem {
    async fn read_to_string(&self, path: &Path) -> Result<String, FsError> {
        tokio::fs::read_to_string(path)
            .await
            .map_err(|e| FsError::from_io(path, e))
    }

    async fn write(&self, path: &Path, contents: &str, mode: Option<u32>) -> Result<(), FsError> {
        tokio::fs::write(path, contents)
            .await
            .map_err(|e| FsError::from_io(path, e))?;
        #[cfg(unix)]
        if let Some(mode) = mode {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
                .await
                .map_err(|e| FsError::from_io(path, e))?;
        }
        #[cfg(not(unix))]
        let _ = mode;
        Ok(())
    }

    async fn mkdir_all(&self, path: &Path) -> Result<(), FsError> {
        tokio::fs::create_dir_all(path)
            .await
            .map_err(|e| FsError::from_io(path, e))
    }

    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }
}

#[derive(Debug, Default)]
struct MemoryFilesystemInner {
    files: BTreeMap<PathBuf, String>,
    directories: Vec<PathBuf>,
    writes: Vec<PathBuf>,
}

/// In-memory filesystem for tests.
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping; clones share
/// state.
#[derive(Debug, Clone, Default)]
pub struct MemoryFilesystem {
    inner: Arc<Mutex<MemoryFilesystemInner>>,
}

impl MemoryFilesystem {
    /// Create an empty in-memory filesystem.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate a file.
    pub fn insert(&self, path: impl Into<PathBuf>, contents: impl Into<String>) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.files.insert(path.into(), contents.into());
    }

    /// Current contents of a file, if present.
    pub fn contents(&self, path: &Path) -> Option<String> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.files.get(path).cloned()
    }

    /// Paths written so far, in order (repeats included).
    pub fn writes(&self) -> Vec<PathBuf> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.writes.clone()
    }

    /// Directories created so far.
    pub fn directories(&self) -> Vec<PathBuf> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.directories.clone()
    }
}

#[async_trait]
impl Filesystem for MemoryFilesystem {
    async fn read_to_string(&self, path: &Path) -> Result<String, FsError> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.files.get(path).cloned().ok_or(FsError::NotFound {
            path: path.to_path_buf(),
        })
    }

    async fn write(&self, path: &Path, contents: &str, _mode: Option<u32>) -> Result<(), FsError> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.files.insert(path.to_path_buf(), contents.to_string());
        inner.writes.push(path.to_path_buf());
        Ok(())
    }

    async fn mkdir_all(&self, path: &Path) -> Result<(), FsError> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.directories.push(path.to_path_buf());
        Ok(())
    }

    async fn exists(&self, path: &Path) -> bool {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.files.contains_key(path)
    }
}
