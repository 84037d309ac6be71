//! Viewer configuration.
//!
//! Settings are owned by the embedding application. The pipeline never reads
//! them implicitly: each archive-open takes a [`ViewerConfig`] snapshot from a
//! [`ConfigHandle`], and anyone interested in later changes subscribes to it.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::archive::Limits;
use crate::error::{Error, Result};

pub const DEFAULT_REDIRECT_KEY: &str = "QEDbgTS2R2uqCZYy";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Extract to the persistent filesystem when one is available.
    #[serde(alias = "useFileSystemApi")]
    pub use_file_system_api: bool,
    /// Query parameter marking archive fetches that must not be redirected.
    #[serde(alias = "viewerRedirectKey")]
    pub viewer_redirect_key: String,
    /// Root directory of the persistent filesystem.
    pub storage_root: Option<PathBuf>,
    pub fetch_timeout_secs: Option<u64>,
    pub max_entries: usize,
    pub max_unpacked_bytes: u64,
    /// Base URL the single-page viewer serves archive entries under.
    pub virtual_base: String,
    pub viewer_script: String,
    pub viewer_title: String,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        let limits = Limits::default();
        Self {
            use_file_system_api: true,
            viewer_redirect_key: DEFAULT_REDIRECT_KEY.to_string(),
            storage_root: None,
            fetch_timeout_secs: Some(30),
            max_entries: limits.max_entries,
            max_unpacked_bytes: limits.max_unpacked_bytes,
            virtual_base: "viewer/!/".to_string(),
            viewer_script: "viewer/zipviewer.js".to_string(),
            viewer_title: "Web Archive Viewer".to_string(),
        }
    }
}

impl ViewerConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| Error::Config(e.to_string()))
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn limits(&self) -> Limits {
        Limits {
            max_entries: self.max_entries,
            max_unpacked_bytes: self.max_unpacked_bytes,
        }
    }

    pub fn fetch_timeout(&self) -> Option<Duration> {
        self.fetch_timeout_secs.map(Duration::from_secs)
    }
}

/// Shared, observable configuration.
#[derive(Debug, Clone)]
pub struct ConfigHandle {
    tx: Arc<watch::Sender<ViewerConfig>>,
}

impl ConfigHandle {
    pub fn new(config: ViewerConfig) -> Self {
        Self {
            tx: Arc::new(watch::Sender::new(config)),
        }
    }

    /// The configuration as of now.
    pub fn snapshot(&self) -> ViewerConfig {
        self.tx.borrow().clone()
    }

    /// Observe changes made after this call.
    pub fn subscribe(&self) -> watch::Receiver<ViewerConfig> {
        self.tx.subscribe()
    }

    /// Apply `change`; subscribers are notified only if something differs.
    pub fn update(&self, change: impl FnOnce(&mut ViewerConfig)) -> bool {
        self.tx.send_if_modified(|config| {
            let before = config.clone();
            change(config);
            *config != before
        })
    }
}

impl Default for ConfigHandle {
    fn default() -> Self {
        Self::new(ViewerConfig::default())
    }
}
