use futures::future::join_all;

use super::{Extraction, HTZ_INDEX, NavigationTarget, TargetKind, UnitPhase, UnitReport};
use crate::archive::{ArchiveKind, ArchiveReader};
use crate::error::{Error, Result, StorageError, StorageOp, Warning};
use crate::maff::{ResolveFailure, UnitListing, resolve_index};
use crate::storage::{FileSystem, Namespace, StoredUnit, create_dir_all, write_file_all};

/// Write every entry below a fresh namespace, then resolve what was written.
pub(super) async fn extract(
    reader: &ArchiveReader,
    kind: ArchiveKind,
    name: &str,
    fs: &dyn FileSystem,
) -> Result<Extraction> {
    let ns = Namespace::generate();
    create_dir_all(fs, ns.as_str()).await?;
    tracing::debug!(namespace = %ns, "Namespace created");

    let mut extraction = Extraction::default();
    let mut htz_unit = UnitReport::new(name);
    if kind == ArchiveKind::Htz {
        htz_unit.advance(UnitPhase::Writing);
    }

    for warning in write_all(reader, &ns, fs).await? {
        extraction.warn(warning.into());
    }

    match kind {
        ArchiveKind::Htz => {
            htz_unit.advance(UnitPhase::Resolving);
            let path = ns.join(HTZ_INDEX);
            let found = fs
                .is_file(&path)
                .await
                .map_err(|e| StorageError::new(StorageOp::ReadFile, path.as_str(), e))?;
            if found {
                htz_unit.index_file = Some(HTZ_INDEX.to_string());
                htz_unit.advance(UnitPhase::Ready);
                extraction.targets.push(NavigationTarget {
                    url: fs.to_url(&path),
                    kind: TargetKind::File,
                    unit: htz_unit.name.clone(),
                    index_file: HTZ_INDEX.to_string(),
                });
            } else {
                htz_unit.advance(UnitPhase::Failed);
                extraction.warn(Warning::Unresolved {
                    unit: htz_unit.name.clone(),
                    failure: ResolveFailure::NoIndex,
                });
            }
            extraction.units.push(htz_unit);
        }
        ArchiveKind::Maff => resolve_units(&ns, fs, &mut extraction).await?,
    }

    extraction.finish()
}

/// Decode and write all files concurrently.
///
/// Returns only once every write has settled. A failed write is reported for
/// its path without affecting its siblings; a decode failure is fatal.
async fn write_all(
    reader: &ArchiveReader,
    ns: &Namespace,
    fs: &dyn FileSystem,
) -> Result<Vec<StorageError>> {
    let writes = reader.files().map(|entry| async move {
        let decoded = reader.read(entry).await?;
        let path = ns.join(&decoded.path);
        Ok::<_, Error>(write_file_all(fs, &path, &decoded.data).await.err())
    });

    let mut failures = Vec::new();
    for outcome in join_all(writes).await {
        if let Some(failure) = outcome? {
            failures.push(failure);
        }
    }
    tracing::debug!(failed = failures.len(), "All writes settled");
    Ok(failures)
}

/// Resolve every top-level directory of the namespace concurrently.
async fn resolve_units(
    ns: &Namespace,
    fs: &dyn FileSystem,
    extraction: &mut Extraction,
) -> Result<()> {
    let listing = fs
        .read_dir(ns.as_str())
        .await
        .map_err(|e| StorageError::new(StorageOp::ReadDirectory, ns.as_str(), e))?;
    let mut dirs: Vec<String> = listing
        .into_iter()
        .filter(|e| e.is_dir)
        .map(|e| e.name)
        .collect();
    dirs.sort();

    let units: Vec<StoredUnit<'_>> = dirs.iter().map(|d| StoredUnit::new(fs, ns.join(d))).collect();
    let resolved = join_all(units.iter().map(|unit| resolve_index(unit))).await;

    for (unit, outcome) in units.iter().zip(resolved) {
        let mut report = UnitReport::new(unit.name());
        report.advance(UnitPhase::Resolving);
        match outcome {
            Ok(index) => {
                report.advance(UnitPhase::Ready);
                extraction.targets.push(NavigationTarget {
                    url: fs.to_url(&format!("{}/{}", unit.dir(), index)),
                    kind: TargetKind::File,
                    unit: unit.name().to_string(),
                    index_file: index.clone(),
                });
                report.index_file = Some(index);
            }
            Err(failure) => {
                report.advance(UnitPhase::Failed);
                extraction.warn(Warning::Unresolved {
                    unit: unit.name().to_string(),
                    failure,
                });
            }
        }
        extraction.units.push(report);
    }
    Ok(())
}
