//! Archive blobs and their decoded entries.

use anyhow::Result as AnyResult;
use async_trait::async_trait;
use base64::Engine as _;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::io::ReadAt;
use crate::source::{filename_parts, mime_for_filename};
use crate::zip::{ZipExtractor, ZipFileEntry};

/// An acquired archive: bytes plus the display filename and MIME type.
///
/// Immutable once created; cloning shares the bytes.
#[derive(Debug, Clone)]
pub struct ArchiveBlob {
    filename: String,
    mime: String,
    data: Arc<[u8]>,
}

impl ArchiveBlob {
    /// Create a blob whose MIME type is inferred from `filename`.
    pub fn new(filename: impl Into<String>, data: impl Into<Arc<[u8]>>) -> Self {
        let filename = filename.into();
        let mime = mime_for_filename(&filename);
        Self::with_mime(filename, mime, data)
    }

    pub fn with_mime(
        filename: impl Into<String>,
        mime: impl Into<String>,
        data: impl Into<Arc<[u8]>>,
    ) -> Self {
        Self {
            filename: filename.into(),
            mime: mime.into(),
            data: data.into(),
        }
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn kind(&self) -> ArchiveKind {
        ArchiveKind::from_filename(&self.filename)
    }

    /// Encode as a `data:` URL with a `filename=` parameter naming `display_name`.
    pub fn to_data_url(&self, display_name: &str) -> String {
        format!(
            "data:{};filename={};base64,{}",
            self.mime,
            urlencoding::encode(display_name),
            base64::engine::general_purpose::STANDARD.encode(&self.data)
        )
    }
}

#[async_trait]
impl ReadAt for ArchiveBlob {
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> AnyResult<usize> {
        let start = usize::try_from(offset)?;
        if start > self.data.len() {
            anyhow::bail!("Read past end of archive: offset {}", offset);
        }
        let n = buf.len().min(self.data.len() - start);
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        Ok(n)
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Archive flavour, decided by the filename extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    /// A single page with `index.html` at the root. Also the default.
    Htz,
    /// One page per top-level directory.
    Maff,
}

impl ArchiveKind {
    pub fn from_filename(filename: &str) -> Self {
        let (_, ext) = filename_parts(filename);
        if ext.eq_ignore_ascii_case("maff") {
            ArchiveKind::Maff
        } else {
            ArchiveKind::Htz
        }
    }
}

/// A decoded archive entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Slash separated path relative to the archive root.
    pub path: String,
    pub data: Vec<u8>,
    pub is_directory: bool,
}

/// Upper bounds enforced before any entry is inflated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_entries: usize,
    pub max_unpacked_bytes: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            max_unpacked_bytes: 1 << 30,
        }
    }
}

/// Decodes the entries of one archive blob on demand.
pub struct ArchiveReader {
    extractor: ZipExtractor<ArchiveBlob>,
    entries: Vec<ZipFileEntry>,
}

impl ArchiveReader {
    /// Read the central directory and check it against `limits`.
    pub async fn open(blob: Arc<ArchiveBlob>, limits: &Limits) -> Result<Self> {
        let extractor = ZipExtractor::new(blob);
        let entries = extractor.list_files().await.map_err(Error::Decode)?;

        if entries.len() > limits.max_entries {
            return Err(Error::LimitExceeded(format!(
                "{} entries, at most {} allowed",
                entries.len(),
                limits.max_entries
            )));
        }
        let unpacked = entries
            .iter()
            .fold(0u64, |acc, e| acc.saturating_add(e.uncompressed_size));
        if unpacked > limits.max_unpacked_bytes {
            return Err(Error::LimitExceeded(format!(
                "{} bytes unpacked, at most {} allowed",
                unpacked, limits.max_unpacked_bytes
            )));
        }

        Ok(Self { extractor, entries })
    }

    /// Central directory listing, in archive order.
    pub fn entries(&self) -> &[ZipFileEntry] {
        &self.entries
    }

    /// Entries that carry data, i.e. everything but directory markers.
    pub fn files(&self) -> impl Iterator<Item = &ZipFileEntry> {
        self.entries.iter().filter(|e| !e.is_directory)
    }

    /// Decode one entry.
    pub async fn read(&self, entry: &ZipFileEntry) -> Result<ArchiveEntry> {
        let data = if entry.is_directory {
            Vec::new()
        } else {
            self.extractor
                .extract_to_memory(entry)
                .await
                .map_err(Error::Decode)?
        };
        Ok(ArchiveEntry {
            path: entry.file_name.clone(),
            data,
            is_directory: entry.is_directory,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zip::ZipWriter;
    use byteorder::{LittleEndian, WriteBytesExt};
    use rstest::rstest;

    /// One stored entry `a` whose central directory record takes its
    /// compressed size and/or local header offset from a ZIP64 extra field.
    fn zip64_overrides(compressed_size: Option<u64>, lfh_offset: Option<u64>) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(b"PK\x03\x04");
        for field in [20u16, 0, 0, 0, 0] {
            out.write_u16::<LittleEndian>(field).unwrap();
        }
        for field in [0u32, 0, 0] {
            out.write_u32::<LittleEndian>(field).unwrap();
        }
        out.write_u16::<LittleEndian>(1).unwrap();
        out.write_u16::<LittleEndian>(0).unwrap();
        out.push(b'a');

        let saturated = |value: Option<u64>| if value.is_some() { u32::MAX } else { 0 };
        let overrides: Vec<u64> = [compressed_size, lfh_offset].into_iter().flatten().collect();
        let cd_offset = out.len() as u32;
        out.extend_from_slice(b"PK\x01\x02");
        for field in [20u16, 20, 0, 0, 0, 0] {
            out.write_u16::<LittleEndian>(field).unwrap();
        }
        out.write_u32::<LittleEndian>(0).unwrap();
        out.write_u32::<LittleEndian>(saturated(compressed_size)).unwrap();
        out.write_u32::<LittleEndian>(0).unwrap();
        out.write_u16::<LittleEndian>(1).unwrap();
        out.write_u16::<LittleEndian>(4 + 8 * overrides.len() as u16).unwrap();
        for field in [0u16, 0, 0] {
            out.write_u16::<LittleEndian>(field).unwrap();
        }
        out.write_u32::<LittleEndian>(0).unwrap();
        out.write_u32::<LittleEndian>(saturated(lfh_offset)).unwrap();
        out.push(b'a');
        out.write_u16::<LittleEndian>(0x0001).unwrap();
        out.write_u16::<LittleEndian>(8 * overrides.len() as u16).unwrap();
        for value in overrides {
            out.write_u64::<LittleEndian>(value).unwrap();
        }
        let cd_size = out.len() as u32 - cd_offset;

        out.extend_from_slice(b"PK\x05\x06");
        for field in [0u16, 0, 1, 1] {
            out.write_u16::<LittleEndian>(field).unwrap();
        }
        out.write_u32::<LittleEndian>(cd_size).unwrap();
        out.write_u32::<LittleEndian>(cd_offset).unwrap();
        out.write_u16::<LittleEndian>(0).unwrap();
        out
    }

    #[rstest]
    #[case("page.htz", ArchiveKind::Htz)]
    #[case("pages.maff", ArchiveKind::Maff)]
    #[case("PAGES.MAFF", ArchiveKind::Maff)]
    #[case("archive.zip", ArchiveKind::Htz)]
    #[case("no-extension", ArchiveKind::Htz)]
    fn test_kind_from_filename(#[case] filename: &str, #[case] expected: ArchiveKind) {
        assert_eq!(ArchiveKind::from_filename(filename), expected);
    }

    #[test]
    fn test_data_url_carries_filename() {
        let blob = ArchiveBlob::new("my page.htz", b"PK".to_vec());
        assert_eq!(
            blob.to_data_url("my page.htz"),
            "data:application/html+zip;filename=my%20page.htz;base64,UEs="
        );
    }

    #[tokio::test]
    async fn test_limits_are_checked_before_decoding() {
        let mut writer = ZipWriter::new();
        writer.add_file("a", b"0123456789").unwrap();
        writer.add_file("b", b"0123456789").unwrap();
        let blob = Arc::new(ArchiveBlob::new("a.htz", writer.finish().unwrap()));

        let few = Limits { max_entries: 1, ..Limits::default() };
        assert!(matches!(
            ArchiveReader::open(blob.clone(), &few).await,
            Err(Error::LimitExceeded(_))
        ));

        let small = Limits { max_unpacked_bytes: 15, ..Limits::default() };
        assert!(matches!(
            ArchiveReader::open(blob.clone(), &small).await,
            Err(Error::LimitExceeded(_))
        ));

        let reader = ArchiveReader::open(blob, &Limits::default()).await.unwrap();
        assert_eq!(reader.files().count(), 2);
    }

    #[tokio::test]
    async fn test_garbage_is_a_decode_error() {
        let blob = Arc::new(ArchiveBlob::new("a.htz", b"<html>not a zip</html>".to_vec()));
        assert!(matches!(
            ArchiveReader::open(blob, &Limits::default()).await,
            Err(Error::Decode(_))
        ));
    }

    #[rstest]
    #[case::local_header_offset(None, Some(u64::MAX - 5))]
    #[case::compressed_size(Some(u64::MAX - 5), None)]
    #[case::both(Some(u64::MAX), Some(u64::MAX))]
    #[tokio::test]
    async fn test_out_of_range_zip64_values_are_decode_errors(
        #[case] compressed_size: Option<u64>,
        #[case] lfh_offset: Option<u64>,
    ) {
        let data = zip64_overrides(compressed_size, lfh_offset);
        let blob = Arc::new(ArchiveBlob::new("a.htz", data));
        let reader = ArchiveReader::open(blob, &Limits::default()).await.unwrap();

        let entry = reader.files().next().unwrap();
        assert!(matches!(reader.read(entry).await, Err(Error::Decode(_))));
    }

    #[tokio::test]
    async fn test_plain_entry_of_handmade_archive_reads() {
        let blob = Arc::new(ArchiveBlob::new("a.htz", zip64_overrides(None, None)));
        let reader = ArchiveReader::open(blob, &Limits::default()).await.unwrap();

        let entry = reader.files().next().unwrap();
        let read = reader.read(entry).await.unwrap();
        assert_eq!(read.path, "a");
        assert!(read.data.is_empty());
    }
}
