//! Metadata Resolver: which file of a MAFF unit is its index page.
//!
//! A unit is one top-level directory of a `.maff` archive. The same policy
//! runs over units held in memory ([`MemoryUnit`]) and units persisted to a
//! filesystem (`storage::StoredUnit`), through the [`UnitListing`] trait.

mod rdf;

pub use rdf::{MAF_NS, RDF_NS, RdfMetadata};

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::io;
use thiserror::Error;

use crate::archive::ArchiveEntry;

/// Name of the metadata sidecar of a unit.
pub const RDF_FILENAME: &str = "index.rdf";

/// Read-only view of one unit's files.
#[async_trait]
pub trait UnitListing: Send + Sync {
    /// Name of the unit, i.e. its top-level directory.
    fn name(&self) -> &str;

    /// Names of the unit's direct files, in no particular order.
    async fn file_names(&self) -> io::Result<Vec<String>>;

    /// Contents of the file at `path` (relative to the unit), `None` if absent.
    async fn read_file(&self, path: &str) -> io::Result<Option<Vec<u8>>>;

    async fn has_file(&self, path: &str) -> io::Result<bool>;
}

/// Why a unit has no index page.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveFailure {
    #[error("unreadable {RDF_FILENAME}: {0}")]
    UnreadableRdf(String),

    #[error("declared index file '{declared}' does not exist and no index.* file was found")]
    MissingIndex { declared: String },

    #[error("unable to list directory: {0}")]
    UnreadableDirectory(String),

    #[error("no index file found")]
    NoIndex,
}

/// Find the index page of `unit`.
///
/// The file named by the unit's `index.rdf` wins when it exists. Otherwise
/// the first direct `index.*` file in byte order is used (`index.rdf`
/// itself is never a candidate).
pub async fn resolve_index(unit: &dyn UnitListing) -> Result<String, ResolveFailure> {
    let mut declared = None;

    match unit.read_file(RDF_FILENAME).await {
        Ok(Some(bytes)) => {
            let meta = RdfMetadata::parse(&bytes)
                .map_err(|e| ResolveFailure::UnreadableRdf(format!("{e:#}")))?;
            if let Some(index) = meta.index_filename {
                match unit.has_file(&index).await {
                    Ok(true) => return Ok(index),
                    Ok(false) => {
                        tracing::debug!(
                            unit = unit.name(),
                            index = %index,
                            "Declared index file is missing"
                        );
                    }
                    Err(e) => {
                        tracing::warn!(
                            unit = unit.name(),
                            index = %index,
                            error = %e,
                            "Unable to check declared index file, treating it as missing"
                        );
                    }
                }
                declared = Some(index);
            }
        }
        Ok(None) => {}
        Err(e) => return Err(ResolveFailure::UnreadableRdf(e.to_string())),
    }

    let mut names = unit
        .file_names()
        .await
        .map_err(|e| ResolveFailure::UnreadableDirectory(e.to_string()))?;
    names.sort();

    match names
        .into_iter()
        .find(|n| n.starts_with("index.") && n != RDF_FILENAME)
    {
        Some(index) => Ok(index),
        None => Err(match declared {
            Some(declared) => ResolveFailure::MissingIndex { declared },
            None => ResolveFailure::NoIndex,
        }),
    }
}

/// A unit whose files are held in memory, keyed by path relative to the unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryUnit {
    name: String,
    files: BTreeMap<String, Vec<u8>>,
}

impl MemoryUnit {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            files: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, path: impl Into<String>, data: Vec<u8>) {
        self.files.insert(path.into(), data);
    }

    pub fn files(&self) -> &BTreeMap<String, Vec<u8>> {
        &self.files
    }

    pub fn into_files(self) -> BTreeMap<String, Vec<u8>> {
        self.files
    }
}

#[async_trait]
impl UnitListing for MemoryUnit {
    fn name(&self) -> &str {
        &self.name
    }

    async fn file_names(&self) -> io::Result<Vec<String>> {
        Ok(self
            .files
            .keys()
            .filter(|p| !p.contains('/'))
            .cloned()
            .collect())
    }

    async fn read_file(&self, path: &str) -> io::Result<Option<Vec<u8>>> {
        Ok(self.files.get(path).cloned())
    }

    async fn has_file(&self, path: &str) -> io::Result<bool> {
        Ok(self.files.contains_key(path))
    }
}

/// Group archive entries by their top-level directory.
///
/// Directory markers and files at the archive root belong to no unit. Units
/// come back ordered by name.
pub fn partition_units(entries: impl IntoIterator<Item = ArchiveEntry>) -> Vec<MemoryUnit> {
    let mut units: BTreeMap<String, MemoryUnit> = BTreeMap::new();
    for entry in entries {
        if entry.is_directory {
            continue;
        }
        let Some((dir, rest)) = entry.path.split_once('/') else {
            continue;
        };
        if dir.is_empty() || rest.is_empty() {
            continue;
        }
        units
            .entry(dir.to_string())
            .or_insert_with(|| MemoryUnit::new(dir))
            .insert(rest, entry.data);
    }
    units.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn rdf(index: &str) -> Vec<u8> {
        format!(
            r#"<?xml version="1.0"?>
<RDF:RDF xmlns:MAF="http://maf.mozdev.org/metadata/rdf#"
         xmlns:RDF="http://www.w3.org/1999/02/22-rdf-syntax-ns#">
  <RDF:Description RDF:about="urn:root">
    <MAF:indexfilename RDF:resource="{index}"/>
  </RDF:Description>
</RDF:RDF>"#
        )
        .into_bytes()
    }

    fn unit(files: &[(&str, Vec<u8>)]) -> MemoryUnit {
        let mut unit = MemoryUnit::new("u");
        for (path, data) in files {
            unit.insert(*path, data.clone());
        }
        unit
    }

    #[tokio::test]
    async fn test_rdf_declared_index_wins() {
        let unit = unit(&[
            ("index.rdf", rdf("page.html")),
            ("page.html", b"<p>".to_vec()),
            ("index.html", b"<p>".to_vec()),
        ]);
        assert_eq!(resolve_index(&unit).await, Ok("page.html".to_string()));
    }

    #[tokio::test]
    async fn test_missing_rdf_target_falls_back() {
        let unit = unit(&[("index.rdf", rdf("gone.html")), ("index.htm", b"<p>".to_vec())]);
        assert_eq!(resolve_index(&unit).await, Ok("index.htm".to_string()));
    }

    #[rstest]
    #[case(&["index.xhtml", "index.html", "page.html"], Ok("index.html"))]
    #[case(&["index.htm"], Ok("index.htm"))]
    #[case(&["page.html", "sub/index.html"], Err(ResolveFailure::NoIndex))]
    #[case(&[], Err(ResolveFailure::NoIndex))]
    #[tokio::test]
    async fn test_pattern_fallback(
        #[case] names: &[&str],
        #[case] expected: Result<&str, ResolveFailure>,
    ) {
        let files: Vec<_> = names.iter().map(|n| (*n, Vec::new())).collect();
        let got = resolve_index(&unit(&files)).await;
        assert_eq!(got, expected.map(str::to_string));
    }

    #[tokio::test]
    async fn test_rdf_is_never_the_index() {
        let unit = unit(&[("index.rdf", rdf("gone.html")), ("page.html", Vec::new())]);
        assert_eq!(
            resolve_index(&unit).await,
            Err(ResolveFailure::MissingIndex { declared: "gone.html".into() })
        );
    }

    /// A unit whose existence checks always fail.
    struct FailingChecks(MemoryUnit);

    #[async_trait]
    impl UnitListing for FailingChecks {
        fn name(&self) -> &str {
            self.0.name()
        }

        async fn file_names(&self) -> io::Result<Vec<String>> {
            self.0.file_names().await
        }

        async fn read_file(&self, path: &str) -> io::Result<Option<Vec<u8>>> {
            self.0.read_file(path).await
        }

        async fn has_file(&self, _path: &str) -> io::Result<bool> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"))
        }
    }

    #[tokio::test]
    async fn test_failed_existence_check_falls_back() {
        let failing = FailingChecks(unit(&[
            ("index.rdf", rdf("page.html")),
            ("page.html", Vec::new()),
            ("index.htm", Vec::new()),
        ]));
        assert_eq!(resolve_index(&failing).await, Ok("index.htm".to_string()));

        let failing = FailingChecks(unit(&[
            ("index.rdf", rdf("page.html")),
            ("page.html", Vec::new()),
        ]));
        assert_eq!(
            resolve_index(&failing).await,
            Err(ResolveFailure::MissingIndex { declared: "page.html".into() })
        );
    }

    #[tokio::test]
    async fn test_unreadable_rdf_is_reported() {
        let unit = unit(&[
            ("index.rdf", b"<RDF><broken></RDF>".to_vec()),
            ("index.html", Vec::new()),
        ]);
        assert!(matches!(
            resolve_index(&unit).await,
            Err(ResolveFailure::UnreadableRdf(_))
        ));
    }

    #[test]
    fn test_partition_by_top_level_directory() {
        let entry = |path: &str, is_directory| ArchiveEntry {
            path: path.to_string(),
            data: path.as_bytes().to_vec(),
            is_directory,
        };
        let units = partition_units(vec![
            entry("b/", true),
            entry("b/index.html", false),
            entry("a/index.rdf", false),
            entry("a/files/img.png", false),
            entry("stray.txt", false),
        ]);

        let names: Vec<_> = units.iter().map(|u| u.name().to_string()).collect();
        assert_eq!(names, ["a", "b"]);
        let paths: Vec<_> = units[0].files().keys().cloned().collect();
        assert_eq!(paths, ["files/img.png", "index.rdf"]);
        assert_eq!(units[1].files()["index.html"], b"b/index.html");
    }
}
