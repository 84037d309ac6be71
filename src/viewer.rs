//! Front end glue: acquire an archive, extract it, open the results.

use std::sync::Arc;

use crate::archive::ArchiveBlob;
use crate::config::{ConfigHandle, ViewerConfig};
use crate::error::{Error, Result, Warning};
use crate::navigate::{TabHost, dispatch};
use crate::pipeline::{Extraction, StorageMode, extract};
use crate::redirect::ViewerRequest;
use crate::source::{acquire, split_url};
use crate::storage::{FileSystem, LocalFileSystem};

/// Opens web archives into the tabs of a [`TabHost`].
///
/// Each open takes a fresh configuration snapshot, so changes made through
/// the [`ConfigHandle`] apply from the next open on.
pub struct Viewer {
    config: ConfigHandle,
    fs: Option<Arc<dyn FileSystem>>,
    host: Arc<dyn TabHost>,
}

impl Viewer {
    /// A viewer without a persistent filesystem; everything is extracted in memory.
    pub fn new(config: ConfigHandle, host: Arc<dyn TabHost>) -> Self {
        Self { config, fs: None, host }
    }

    /// A viewer whose persistent filesystem lives at the configured `storage_root`.
    ///
    /// A root that cannot be used is logged and leaves the viewer in-memory only.
    pub fn from_config(config: ConfigHandle, host: Arc<dyn TabHost>) -> Self {
        let root = config.snapshot().storage_root;
        let viewer = Self::new(config, host);
        match root.map(LocalFileSystem::new) {
            Some(Ok(fs)) => viewer.with_file_system(Arc::new(fs)),
            Some(Err(e)) => {
                tracing::warn!(
                    error = %e,
                    "Persistent storage unavailable, using in-memory extraction"
                );
                viewer
            }
            None => viewer,
        }
    }

    pub fn with_file_system(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = Some(fs);
        self
    }

    pub fn config(&self) -> &ConfigHandle {
        &self.config
    }

    /// Fetch the archive at `url` and open it. The query string and fragment
    /// of `url` carry over to every opened page.
    #[tracing::instrument(skip(self))]
    pub async fn open_url(&self, url: &str) -> Result<Extraction> {
        let config = self.config.snapshot();
        let blob = acquire(url, config.fetch_timeout()).await?;
        let (_, search, hash) = split_url(url);
        self.run(blob, &config, search, hash).await
    }

    /// Handle a viewer page URL produced by [`viewer_redirect`].
    ///
    /// Returns `Ok(None)` when the URL asks for nothing to be opened.
    ///
    /// [`viewer_redirect`]: crate::redirect::viewer_redirect
    #[tracing::instrument(skip(self))]
    pub async fn open_viewer_url(&self, viewer_url: &str) -> Result<Option<Extraction>> {
        let config = self.config.snapshot();
        let Some(request) = ViewerRequest::parse(viewer_url, &config.viewer_redirect_key) else {
            return Ok(None);
        };
        let blob = acquire(&request.source_url, config.fetch_timeout()).await?;
        self.run(blob, &config, &request.search, &request.hash)
            .await
            .map(Some)
    }

    /// Open a user supplied archive.
    #[tracing::instrument(skip_all, fields(filename = blob.filename()))]
    pub async fn open_blob(
        &self,
        blob: ArchiveBlob,
        search: &str,
        hash: &str,
    ) -> Result<Extraction> {
        let config = self.config.snapshot();
        self.run(blob, &config, search, hash).await
    }

    fn storage_mode(&self, config: &ViewerConfig) -> StorageMode {
        match &self.fs {
            Some(fs) if config.use_file_system_api => StorageMode::Persistent(fs.clone()),
            _ => StorageMode::InMemory,
        }
    }

    async fn run(
        &self,
        blob: ArchiveBlob,
        config: &ViewerConfig,
        search: &str,
        hash: &str,
    ) -> Result<Extraction> {
        let mode = self.storage_mode(config);
        let mut extraction = match extract(blob.clone(), &mode, config).await {
            Err(Error::Storage(e)) if matches!(mode, StorageMode::Persistent(_)) => {
                tracing::warn!(error = %e, "Persistent extraction failed, retrying in memory");
                let mut extraction = extract(blob, &StorageMode::InMemory, config).await?;
                extraction.warnings.insert(0, Warning::Storage(e));
                extraction
            }
            result => result?,
        };

        let refused = dispatch(&extraction.targets, self.host.as_ref(), search, hash).await?;
        extraction.warnings.extend(refused);
        Ok(extraction)
    }
}
