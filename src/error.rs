//! Error types for opening web archives.
//!
//! Low-level parsing keeps [`anyhow`] internally; everything that crosses the
//! public API is folded into [`Error`] so the front end can report a single
//! descriptive message per failed archive-open.

use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::maff::ResolveFailure;

/// Result alias for archive-open operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Fatal failures of a single archive-open.
#[derive(Debug, Error)]
pub enum Error {
    /// The archive bytes could not be fetched.
    #[error("unable to load the specified archive '{url}': {source}")]
    Acquisition {
        url: String,
        #[source]
        source: AcquisitionError,
    },

    /// The archive bytes are not a usable ZIP container.
    #[error("unable to load the zip file: {0:#}")]
    Decode(anyhow::Error),

    /// The archive is larger than the configured limits allow.
    #[error("archive exceeds the configured limit: {0}")]
    LimitExceeded(String),

    /// A path of the persistent filesystem could not be created or written.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Every unit was dropped, or the archive contained none.
    #[error("no available data can be loaded from this archive")]
    NoNavigableContent,

    /// The host refused to open a produced target.
    #[error("unable to open '{url}': {reason}")]
    Navigation { url: String, reason: String },

    /// The configuration could not be loaded.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Why the archive bytes could not be fetched.
#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("server responded with status {0}")]
    Status(u16),

    #[error("fetch aborted")]
    Aborted,

    #[error("unable to read local file: {0}")]
    LocalFile(#[source] io::Error),

    #[error("unsupported source url: {0}")]
    UnsupportedUrl(String),
}

/// A filesystem create/write failure for one specific path.
///
/// Sibling writes are not affected; see [`Warning`].
#[derive(Debug, Error)]
#[error("unable to {op} '{path}': {source}")]
pub struct StorageError {
    pub op: StorageOp,
    pub path: String,
    #[source]
    pub source: io::Error,
}

impl StorageError {
    pub fn new(op: StorageOp, path: impl Into<String>, source: io::Error) -> Self {
        Self {
            op,
            path: path.into(),
            source,
        }
    }
}

/// Filesystem operation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageOp {
    CreateDirectory,
    WriteFile,
    ReadFile,
    ReadDirectory,
}

impl std::fmt::Display for StorageOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let op = match self {
            StorageOp::CreateDirectory => "create directory",
            StorageOp::WriteFile => "write file",
            StorageOp::ReadFile => "read file",
            StorageOp::ReadDirectory => "read directory",
        };
        f.write_str(op)
    }
}

/// Non-fatal problems collected while extracting and opening an archive.
#[derive(Debug, Error)]
pub enum Warning {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("unit '{unit}' dropped: {failure}")]
    Unresolved {
        unit: String,
        failure: ResolveFailure,
    },

    #[error("unit '{unit}' dropped: unable to rebuild its archive: {reason}")]
    Rebuild { unit: String, reason: String },

    #[error("unable to open '{url}': {reason}")]
    Navigation { url: String, reason: String },
}
