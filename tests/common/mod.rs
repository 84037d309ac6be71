#![allow(dead_code)]

use async_trait::async_trait;
use base64::Engine as _;
use std::io;
use std::sync::Mutex;

use htzview::storage::{DirEntry, FileSystem, LocalFileSystem};
use htzview::zip::ZipWriter;
use htzview::{ArchiveBlob, TabHost};

pub fn rdf(index: &str) -> Vec<u8> {
    format!(
        r#"<?xml version="1.0"?>
<RDF:RDF xmlns:MAF="http://maf.mozdev.org/metadata/rdf#"
         xmlns:NC="http://home.netscape.com/NC-rdf#"
         xmlns:RDF="http://www.w3.org/1999/02/22-rdf-syntax-ns#">
  <RDF:Description RDF:about="urn:root">
    <MAF:originalurl RDF:resource="http://example.com/"/>
    <MAF:indexfilename RDF:resource="{index}"/>
  </RDF:Description>
</RDF:RDF>"#
    )
    .into_bytes()
}

pub fn zip(files: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let mut writer = ZipWriter::new();
    for (name, data) in files {
        writer.add_file(name, data).unwrap();
    }
    writer.finish().unwrap()
}

/// Two units: `a` declares `page.html` through its RDF, `b` only has `index.htm`.
pub fn two_unit_maff() -> ArchiveBlob {
    ArchiveBlob::new(
        "pages.maff",
        zip(&[
            ("a/index.rdf", rdf("page.html")),
            ("a/page.html", b"<p>a</p>".to_vec()),
            ("a/index.html", b"<p>decoy</p>".to_vec()),
            ("a/page_files/style.css", b"body{}".to_vec()),
            ("b/index.htm", b"<p>b</p>".to_vec()),
        ]),
    )
}

/// Every unit lacks an index.
pub fn unresolvable_maff() -> ArchiveBlob {
    ArchiveBlob::new(
        "broken.maff",
        zip(&[
            ("a/index.rdf", rdf("gone.html")),
            ("a/page.html", b"<p>a</p>".to_vec()),
            ("b/readme.txt", b"nothing here".to_vec()),
        ]),
    )
}

/// Decode an opened bootstrap URL into its HTML page and fragment.
pub fn bootstrap_page(url: &str) -> (String, Option<&str>) {
    let (page, hash) = match url.split_once('#') {
        Some((page, hash)) => (page, Some(hash)),
        None => (url, None),
    };
    let encoded = page.strip_prefix("data:text/html;charset=utf-8;base64,").unwrap();
    let html = base64::engine::general_purpose::STANDARD.decode(encoded).unwrap();
    (String::from_utf8(html).unwrap(), hash)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Opened {
    Current(String),
    Background(String),
}

#[derive(Default)]
pub struct RecordingHost {
    pub opened: Mutex<Vec<Opened>>,
}

impl RecordingHost {
    pub fn opened(&self) -> Vec<Opened> {
        self.opened.lock().unwrap().clone()
    }

    pub fn urls(&self) -> Vec<String> {
        self.opened()
            .into_iter()
            .map(|o| match o {
                Opened::Current(url) | Opened::Background(url) => url,
            })
            .collect()
    }
}

#[async_trait]
impl TabHost for RecordingHost {
    async fn update_current(&self, url: &str) -> anyhow::Result<()> {
        self.opened.lock().unwrap().push(Opened::Current(url.to_string()));
        Ok(())
    }

    async fn open_background(&self, url: &str) -> anyhow::Result<()> {
        self.opened.lock().unwrap().push(Opened::Background(url.to_string()));
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsEvent {
    Wrote(String),
    Listed(String),
    Read(String),
    Checked(String),
}

impl FsEvent {
    pub fn is_write(&self) -> bool {
        matches!(self, FsEvent::Wrote(_))
    }
}

/// Local filesystem that records the order in which operations complete.
pub struct RecordingFs {
    inner: LocalFileSystem,
    pub events: Mutex<Vec<FsEvent>>,
}

impl RecordingFs {
    pub fn new(inner: LocalFileSystem) -> Self {
        Self {
            inner,
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn events(&self) -> Vec<FsEvent> {
        self.events.lock().unwrap().clone()
    }

    fn record(&self, event: FsEvent) {
        self.events.lock().unwrap().push(event);
    }
}

#[async_trait]
impl FileSystem for RecordingFs {
    async fn create_dir(&self, path: &str) -> io::Result<()> {
        self.inner.create_dir(path).await
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> io::Result<()> {
        // Let later writes overtake earlier ones.
        tokio::task::yield_now().await;
        let result = self.inner.write_file(path, data).await;
        self.record(FsEvent::Wrote(path.to_string()));
        result
    }

    async fn read_file(&self, path: &str) -> io::Result<Vec<u8>> {
        self.record(FsEvent::Read(path.to_string()));
        self.inner.read_file(path).await
    }

    async fn read_dir(&self, path: &str) -> io::Result<Vec<DirEntry>> {
        self.record(FsEvent::Listed(path.to_string()));
        self.inner.read_dir(path).await
    }

    async fn is_file(&self, path: &str) -> io::Result<bool> {
        self.record(FsEvent::Checked(path.to_string()));
        self.inner.is_file(path).await
    }

    fn to_url(&self, path: &str) -> String {
        self.inner.to_url(path)
    }
}
