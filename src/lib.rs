//! # htzview
//!
//! Opens single-file web archives and renders the pages they contain.
//!
//! Two formats are understood, both plain ZIP containers:
//!
//! - `.htz`: one page, with `index.html` at the archive root
//! - `.maff`: one page per top-level directory, each optionally described by
//!   an `index.rdf` naming its index file
//!
//! An archive goes through [`source`] (bytes and display filename),
//! [`pipeline`] (extraction to a persistent filesystem, or regrouping in
//! memory, with [`maff`] resolving each unit's index page) and finally
//! [`navigate`] (opening the results in the host's tabs). [`Viewer`] wires
//! these together. [`css`] holds the stylesheet URL rewriter used when
//! archive pages are served from a virtual base.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use htzview::{ConfigHandle, TabHost, Viewer};
//!
//! struct Tabs;
//!
//! #[async_trait]
//! impl TabHost for Tabs {
//!     async fn update_current(&self, url: &str) -> anyhow::Result<()> {
//!         println!("open here: {url}");
//!         Ok(())
//!     }
//!
//!     async fn open_background(&self, url: &str) -> anyhow::Result<()> {
//!         println!("open in background: {url}");
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> htzview::Result<()> {
//!     let viewer = Viewer::from_config(ConfigHandle::default(), Arc::new(Tabs));
//!     let extraction = viewer.open_url("https://example.com/saved.maff?lang=en#top").await?;
//!     for warning in &extraction.warnings {
//!         eprintln!("{warning}");
//!     }
//!     Ok(())
//! }
//! ```

pub mod archive;
pub mod bootstrap;
pub mod config;
pub mod css;
pub mod error;
pub mod io;
pub mod maff;
pub mod navigate;
pub mod pipeline;
pub mod redirect;
pub mod source;
pub mod storage;
pub mod viewer;
pub mod zip;

pub use archive::{ArchiveBlob, ArchiveEntry, ArchiveKind, Limits};
pub use config::{ConfigHandle, ViewerConfig};
pub use error::{AcquisitionError, Error, Result, StorageError, Warning};
pub use maff::{ResolveFailure, UnitListing, resolve_index};
pub use navigate::{TabHost, dispatch};
pub use pipeline::{Extraction, NavigationTarget, StorageMode, TargetKind, extract};
pub use storage::{FileSystem, LocalFileSystem};
pub use viewer::Viewer;
