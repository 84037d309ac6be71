//! [`FileSystem`] over a directory of the local disk.

use async_trait::async_trait;
use std::io;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use url::Url;

use super::{DirEntry, FileSystem};

/// Local directory acting as the persistent filesystem root.
///
/// Every path is resolved below `root`; paths that would leave it are
/// rejected with `InvalidInput`.
#[derive(Debug, Clone)]
pub struct LocalFileSystem {
    root: PathBuf,
}

impl LocalFileSystem {
    /// Use `root` as the filesystem root, creating it if missing.
    pub fn new(root: impl AsRef<Path>) -> io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("storage root must be absolute: {}", root.display()),
            ));
        }
        // Runs once per viewer; not worth an async constructor.
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn absolute_path(&self, path: &str) -> io::Result<PathBuf> {
        Ok(self.root.join(validate(path)?))
    }
}

/// Normalize a relative path, refusing anything that escapes the root.
fn validate(path: &str) -> io::Result<PathBuf> {
    let invalid = || io::Error::new(io::ErrorKind::InvalidInput, format!("invalid path: {path:?}"));
    let mut components = Vec::new();
    for component in Path::new(path).components() {
        match component {
            Component::Normal(s) => {
                if s.as_encoded_bytes().contains(&0) {
                    return Err(invalid());
                }
                components.push(s);
            }
            Component::CurDir | Component::RootDir => {}
            Component::Prefix(_) => return Err(invalid()),
            Component::ParentDir => {
                if components.pop().is_none() {
                    return Err(invalid());
                }
            }
        }
    }
    Ok(components.into_iter().collect())
}

#[async_trait]
impl FileSystem for LocalFileSystem {
    async fn create_dir(&self, path: &str) -> io::Result<()> {
        fs::create_dir(self.absolute_path(path)?).await
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> io::Result<()> {
        fs::write(self.absolute_path(path)?, data).await
    }

    async fn read_file(&self, path: &str) -> io::Result<Vec<u8>> {
        fs::read(self.absolute_path(path)?).await
    }

    async fn read_dir(&self, path: &str) -> io::Result<Vec<DirEntry>> {
        let mut entries = fs::read_dir(self.absolute_path(path)?).await?;
        let mut listing = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let file_type = entry.file_type().await?;
            if !file_type.is_dir() && !file_type.is_file() {
                // Most likely a broken symlink.
                continue;
            }
            listing.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_dir: file_type.is_dir(),
            });
        }
        Ok(listing)
    }

    async fn is_file(&self, path: &str) -> io::Result<bool> {
        match fs::metadata(self.absolute_path(path)?).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn to_url(&self, path: &str) -> String {
        let absolute = self.root.join(path);
        Url::from_file_path(&absolute)
            .map(String::from)
            .unwrap_or_else(|()| format!("file://{}", absolute.display()))
    }
}
