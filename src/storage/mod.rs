//! Capability-scoped persistent filesystem.
//!
//! The persistent extraction mode writes archives below a [`Namespace`]
//! directory of a [`FileSystem`]. Paths handed to a [`FileSystem`] are always
//! slash separated and relative to its root.

mod local;

pub use local::LocalFileSystem;

use async_trait::async_trait;
use std::fmt;
use std::io;

use crate::error::{StorageError, StorageOp};
use crate::maff::UnitListing;

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
}

/// Minimal filesystem surface needed to persist and browse an archive.
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Create a single directory. Fails with `AlreadyExists` if it exists.
    async fn create_dir(&self, path: &str) -> io::Result<()>;

    /// Create or truncate a file and write `data` to it.
    async fn write_file(&self, path: &str, data: &[u8]) -> io::Result<()>;

    async fn read_file(&self, path: &str) -> io::Result<Vec<u8>>;

    /// Direct children of a directory, in no particular order.
    async fn read_dir(&self, path: &str) -> io::Result<Vec<DirEntry>>;

    /// Whether `path` exists and is a regular file.
    async fn is_file(&self, path: &str) -> io::Result<bool>;

    /// URL a browsing context can navigate to for `path`.
    fn to_url(&self, path: &str) -> String;
}

/// Create `path` and all of its parents, treating existing directories as
/// success. Empty and `.` segments are skipped.
pub async fn create_dir_all(fs: &dyn FileSystem, path: &str) -> Result<(), StorageError> {
    let mut current = String::new();
    for segment in path.split('/').filter(|s| !s.is_empty() && *s != ".") {
        if !current.is_empty() {
            current.push('/');
        }
        current.push_str(segment);
        match fs.create_dir(&current).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
            Err(e) => return Err(StorageError::new(StorageOp::CreateDirectory, current, e)),
        }
    }
    Ok(())
}

/// Write `data` to `path`, creating missing parent directories first.
pub async fn write_file_all(
    fs: &dyn FileSystem,
    path: &str,
    data: &[u8],
) -> Result<(), StorageError> {
    if let Some((parent, _)) = path.rsplit_once('/') {
        create_dir_all(fs, parent).await?;
    }
    fs.write_file(path, data)
        .await
        .map_err(|e| StorageError::new(StorageOp::WriteFile, path, e))
}

/// Per-open directory prefix isolating one archive's files from any other.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace(String);

impl Namespace {
    /// A fresh random namespace. Never reused.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `path` below this namespace.
    pub fn join(&self, path: &str) -> String {
        format!("{}/{}", self.0, path.trim_start_matches('/'))
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A MAFF unit persisted under `dir` of a [`FileSystem`].
pub struct StoredUnit<'a> {
    fs: &'a dyn FileSystem,
    name: String,
    dir: String,
}

impl<'a> StoredUnit<'a> {
    pub fn new(fs: &'a dyn FileSystem, dir: impl Into<String>) -> Self {
        let dir = dir.into();
        let name = dir.rsplit('/').next().unwrap_or(&dir).to_string();
        Self { fs, name, dir }
    }

    pub fn dir(&self) -> &str {
        &self.dir
    }

    fn path(&self, relative: &str) -> String {
        format!("{}/{}", self.dir, relative)
    }
}

#[async_trait]
impl UnitListing for StoredUnit<'_> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn file_names(&self) -> io::Result<Vec<String>> {
        Ok(self
            .fs
            .read_dir(&self.dir)
            .await?
            .into_iter()
            .filter(|e| !e.is_dir)
            .map(|e| e.name)
            .collect())
    }

    async fn read_file(&self, path: &str) -> io::Result<Option<Vec<u8>>> {
        match self.fs.read_file(&self.path(path)).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn has_file(&self, path: &str) -> io::Result<bool> {
        self.fs.is_file(&self.path(path)).await
    }
}
