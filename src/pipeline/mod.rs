//! Extraction Pipeline: archive blob in, navigable targets out.
//!
//! Both variants share the same steps: decode the central directory, classify
//! the archive, then either persist every entry under a fresh [`Namespace`]
//! ([`StorageMode::Persistent`]) or regroup the entries in memory
//! ([`StorageMode::InMemory`]). MAFF units are resolved concurrently; units
//! without an index are dropped and reported as warnings.
//!
//! [`Namespace`]: crate::storage::Namespace

mod memory;
mod persistent;

use std::fmt;
use std::sync::Arc;

use crate::archive::{ArchiveBlob, ArchiveReader};
use crate::bootstrap::Bootstrap;
use crate::config::ViewerConfig;
use crate::error::{Error, Result, Warning};
use crate::storage::FileSystem;

/// Where extracted entries go.
#[derive(Clone)]
pub enum StorageMode {
    Persistent(Arc<dyn FileSystem>),
    InMemory,
}

impl fmt::Debug for StorageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageMode::Persistent(_) => f.write_str("Persistent"),
            StorageMode::InMemory => f.write_str("InMemory"),
        }
    }
}

/// Lifecycle of one unit (a MAFF directory, or the whole of an HTZ).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitPhase {
    Decoding,
    /// Persistent mode: entries are being written.
    Writing,
    /// In-memory mode: entries are being re-encoded into a standalone archive.
    Rebuilding,
    Resolving,
    Ready,
    Failed,
}

impl UnitPhase {
    fn can_advance_to(self, next: UnitPhase) -> bool {
        use UnitPhase::*;
        matches!(
            (self, next),
            (Decoding, Writing | Resolving | Failed)
                | (Writing, Resolving | Failed)
                | (Resolving, Rebuilding | Ready | Failed)
                | (Rebuilding, Ready | Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, UnitPhase::Ready | UnitPhase::Failed)
    }
}

/// Progress record of one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitReport {
    pub name: String,
    pub phase: UnitPhase,
    pub index_file: Option<String>,
}

impl UnitReport {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            phase: UnitPhase::Decoding,
            index_file: None,
        }
    }

    fn advance(&mut self, next: UnitPhase) {
        debug_assert!(
            self.phase.can_advance_to(next),
            "invalid unit transition {:?} -> {:?}",
            self.phase,
            next
        );
        tracing::trace!(unit = %self.name, from = ?self.phase, to = ?next, "Unit phase");
        self.phase = next;
    }
}

/// What a [`NavigationTarget`] URL points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    /// An extracted file; the source query and fragment both carry over.
    File,
    /// A bootstrap `data:` page. Its payload ends the URL, so only a fragment
    /// can follow it.
    Bootstrap,
}

/// A resolved, openable reference to one unit's index page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationTarget {
    /// Filesystem URL (persistent mode) or bootstrap `data:` URL (in-memory mode).
    pub url: String,
    pub kind: TargetKind,
    pub unit: String,
    pub index_file: String,
}

impl NavigationTarget {
    /// The URL to open, carrying the source's `search` and `hash` where the
    /// target can take them.
    pub fn url_with(&self, search: &str, hash: &str) -> String {
        match self.kind {
            TargetKind::File => format!("{}{search}{hash}", self.url),
            TargetKind::Bootstrap => format!("{}{hash}", self.url),
        }
    }
}

/// Outcome of a successful extraction.
#[derive(Debug, Default)]
pub struct Extraction {
    /// In emission order; the first one replaces the current page.
    pub targets: Vec<NavigationTarget>,
    pub units: Vec<UnitReport>,
    pub warnings: Vec<Warning>,
}

impl Extraction {
    fn warn(&mut self, warning: Warning) {
        tracing::warn!(%warning, "Extraction warning");
        self.warnings.push(warning);
    }

    fn finish(self) -> Result<Self> {
        if self.targets.is_empty() {
            return Err(Error::NoNavigableContent);
        }
        Ok(self)
    }
}

/// Extract `blob` into navigable targets.
#[tracing::instrument(skip_all, fields(filename = blob.filename(), mode = ?mode))]
pub async fn extract(
    blob: ArchiveBlob,
    mode: &StorageMode,
    config: &ViewerConfig,
) -> Result<Extraction> {
    let kind = blob.kind();
    let blob = Arc::new(blob);
    let reader = ArchiveReader::open(blob.clone(), &config.limits()).await?;
    tracing::debug!(?kind, entries = reader.entries().len(), "Archive decoded");

    let extraction = match mode {
        StorageMode::Persistent(fs) => {
            persistent::extract(&reader, kind, blob.filename(), fs.as_ref()).await?
        }
        StorageMode::InMemory => {
            memory::extract(&reader, &blob, kind, &Bootstrap::from(config)).await?
        }
    };

    tracing::info!(
        targets = extraction.targets.len(),
        warnings = extraction.warnings.len(),
        "Extraction finished"
    );
    Ok(extraction)
}

impl From<&ViewerConfig> for Bootstrap {
    fn from(config: &ViewerConfig) -> Self {
        Bootstrap {
            virtual_base: config.virtual_base.clone(),
            viewer_script: config.viewer_script.clone(),
            title: config.viewer_title.clone(),
        }
    }
}

/// Index page of an HTZ archive.
pub const HTZ_INDEX: &str = "index.html";

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(UnitPhase::Decoding, UnitPhase::Writing, true)]
    #[case(UnitPhase::Writing, UnitPhase::Resolving, true)]
    #[case(UnitPhase::Resolving, UnitPhase::Rebuilding, true)]
    #[case(UnitPhase::Rebuilding, UnitPhase::Ready, true)]
    #[case(UnitPhase::Resolving, UnitPhase::Failed, true)]
    #[case(UnitPhase::Ready, UnitPhase::Resolving, false)]
    #[case(UnitPhase::Failed, UnitPhase::Ready, false)]
    #[case(UnitPhase::Writing, UnitPhase::Ready, false)]
    #[case(UnitPhase::Rebuilding, UnitPhase::Resolving, false)]
    fn test_unit_transitions(
        #[case] from: UnitPhase,
        #[case] to: UnitPhase,
        #[case] allowed: bool,
    ) {
        assert_eq!(from.can_advance_to(to), allowed);
    }

    #[rstest]
    #[case(TargetKind::File, "file:///ns/a/index.html?lang=en#top")]
    #[case(TargetKind::Bootstrap, "data:text/html;base64,PHA+#top")]
    fn test_target_url_with_source_suffix(#[case] kind: TargetKind, #[case] expected: &str) {
        let url = match kind {
            TargetKind::File => "file:///ns/a/index.html",
            TargetKind::Bootstrap => "data:text/html;base64,PHA+",
        };
        let target = NavigationTarget {
            url: url.to_string(),
            kind,
            unit: "a".to_string(),
            index_file: "index.html".to_string(),
        };
        assert_eq!(target.url_with("?lang=en", "#top"), expected);
    }

    #[test]
    fn test_empty_extraction_is_not_navigable() {
        assert!(matches!(
            Extraction::default().finish(),
            Err(Error::NoNavigableContent)
        ));
    }
}
