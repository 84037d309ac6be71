use futures::future::join_all;

use super::{Extraction, HTZ_INDEX, NavigationTarget, TargetKind, UnitPhase, UnitReport};
use crate::archive::{ArchiveBlob, ArchiveKind, ArchiveReader};
use crate::bootstrap::Bootstrap;
use crate::error::{Error, Result, Warning};
use crate::maff::{MemoryUnit, ResolveFailure, UnitListing, partition_units, resolve_index};
use crate::zip::ZipWriter;

const REBUILT_MIME: &str = "application/zip";

/// Regroup the archive in memory and point each target at a bootstrap page.
pub(super) async fn extract(
    reader: &ArchiveReader,
    blob: &ArchiveBlob,
    kind: ArchiveKind,
    bootstrap: &Bootstrap,
) -> Result<Extraction> {
    let mut extraction = Extraction::default();

    match kind {
        ArchiveKind::Htz => {
            let mut unit = UnitReport::new(blob.filename());
            unit.advance(UnitPhase::Resolving);
            if reader.files().any(|e| e.file_name == HTZ_INDEX) {
                let url = page_url(bootstrap, HTZ_INDEX, blob, blob.filename())?;
                unit.index_file = Some(HTZ_INDEX.to_string());
                unit.advance(UnitPhase::Ready);
                extraction.targets.push(NavigationTarget {
                    url,
                    kind: TargetKind::Bootstrap,
                    unit: unit.name.clone(),
                    index_file: HTZ_INDEX.to_string(),
                });
            } else {
                unit.advance(UnitPhase::Failed);
                extraction.warn(Warning::Unresolved {
                    unit: unit.name.clone(),
                    failure: ResolveFailure::NoIndex,
                });
            }
            extraction.units.push(unit);
        }
        ArchiveKind::Maff => extract_maff(reader, blob, bootstrap, &mut extraction).await?,
    }

    extraction.finish()
}

async fn extract_maff(
    reader: &ArchiveReader,
    blob: &ArchiveBlob,
    bootstrap: &Bootstrap,
    extraction: &mut Extraction,
) -> Result<()> {
    let entries = join_all(reader.files().map(|entry| reader.read(entry)))
        .await
        .into_iter()
        .collect::<Result<Vec<_>>>()?;
    let units = partition_units(entries);
    tracing::debug!(units = units.len(), "Partitioned archive");

    let resolved = join_all(units.iter().map(|unit| resolve_index(unit))).await;

    let mut survivors = Vec::new();
    for (unit, outcome) in units.into_iter().zip(resolved) {
        let mut report = UnitReport::new(unit.name());
        report.advance(UnitPhase::Resolving);
        match outcome {
            Ok(index) => {
                report.advance(UnitPhase::Rebuilding);
                report.index_file = Some(index);
                survivors.push((report, unit));
            }
            Err(failure) => {
                report.advance(UnitPhase::Failed);
                extraction.warn(Warning::Unresolved {
                    unit: report.name.clone(),
                    failure,
                });
                extraction.units.push(report);
            }
        }
    }

    let rebuilds = survivors.into_iter().map(|(report, unit)| async move {
        let rebuilt = tokio::task::spawn_blocking(move || rebuild(unit))
            .await
            .map_err(anyhow::Error::from)
            .and_then(|r| r);
        (report, rebuilt)
    });

    for (mut report, rebuilt) in join_all(rebuilds).await {
        let index = report.index_file.clone().unwrap_or_default();
        match rebuilt {
            Ok(data) => {
                let unit_blob = ArchiveBlob::with_mime(blob.filename(), REBUILT_MIME, data);
                let url = page_url(bootstrap, &index, &unit_blob, blob.filename())?;
                report.advance(UnitPhase::Ready);
                extraction.targets.push(NavigationTarget {
                    url,
                    kind: TargetKind::Bootstrap,
                    unit: report.name.clone(),
                    index_file: index,
                });
            }
            Err(e) => {
                report.advance(UnitPhase::Failed);
                extraction.warn(Warning::Rebuild {
                    unit: report.name.clone(),
                    reason: format!("{e:#}"),
                });
            }
        }
        extraction.units.push(report);
    }
    Ok(())
}

/// Re-encode one unit as a standalone archive rooted at the unit directory.
fn rebuild(unit: MemoryUnit) -> anyhow::Result<Vec<u8>> {
    let mut writer = ZipWriter::new();
    for (path, data) in unit.into_files() {
        writer.add_file(&path, &data)?;
    }
    writer.finish()
}

fn page_url(
    bootstrap: &Bootstrap,
    index: &str,
    blob: &ArchiveBlob,
    display_name: &str,
) -> Result<String> {
    bootstrap
        .page_url(index, &blob.to_data_url(display_name))
        .map_err(|e| Error::Decode(e.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::Limits;
    use base64::Engine as _;
    use std::sync::Arc;

    fn bootstrap() -> Bootstrap {
        Bootstrap {
            virtual_base: "viewer/!/".into(),
            viewer_script: "viewer/zipviewer.js".into(),
            title: "Viewer".into(),
        }
    }

    async fn open(filename: &str, files: &[(&str, &[u8])]) -> (ArchiveReader, ArchiveBlob) {
        let mut writer = ZipWriter::new();
        for (name, data) in files {
            writer.add_file(name, data).unwrap();
        }
        let blob = ArchiveBlob::new(filename, writer.finish().unwrap());
        let reader = ArchiveReader::open(Arc::new(blob.clone()), &Limits::default())
            .await
            .unwrap();
        (reader, blob)
    }

    fn page(url: &str) -> String {
        let encoded = url.strip_prefix("data:text/html;charset=utf-8;base64,").unwrap();
        let html = base64::engine::general_purpose::STANDARD.decode(encoded).unwrap();
        String::from_utf8(html).unwrap()
    }

    #[tokio::test]
    async fn test_htz_is_handed_over_unchanged() {
        let (reader, blob) = open("my page.htz", &[("index.html", b"<p>")]).await;
        let extraction = extract(&reader, &blob, ArchiveKind::Htz, &bootstrap()).await.unwrap();

        let page = page(&extraction.targets[0].url);
        assert!(page.contains(r#""indexFile":"index.html""#));
        assert!(page.contains(&blob.to_data_url("my page.htz")));
    }

    #[tokio::test]
    async fn test_maff_units_are_rebuilt_without_prefix() {
        let (reader, blob) = open(
            "pages.maff",
            &[("a/index.html", b"<p>a"), ("a/img/x.png", b"png"), ("b/notes.txt", b"")],
        )
        .await;
        let extraction = extract(&reader, &blob, ArchiveKind::Maff, &bootstrap()).await.unwrap();

        assert_eq!(extraction.targets.len(), 1);
        assert_eq!(extraction.targets[0].unit, "a");
        assert_eq!(extraction.warnings.len(), 1);

        let page = page(&extraction.targets[0].url);
        let start = page.find("data:application/zip;filename=pages.maff;base64,").unwrap();
        let zip_url = &page[start..page.find("\"}").unwrap()];
        let encoded = zip_url.rsplit(',').next().unwrap();
        let rebuilt = base64::engine::general_purpose::STANDARD.decode(encoded).unwrap();

        let unit = ArchiveReader::open(
            Arc::new(ArchiveBlob::new("unit.zip", rebuilt)),
            &Limits::default(),
        )
        .await
        .unwrap();
        let names: Vec<_> = unit.files().map(|e| e.file_name.clone()).collect();
        assert_eq!(names, ["img/x.png", "index.html"]);
    }
}
