//! Source Acquisition: getting archive bytes and a display filename.
//!
//! Archives arrive either from a URL (fetched over HTTP, or read from disk for
//! `file:` URLs) or directly from the user (drag-and-drop, file picker). Only
//! the URL path inspects `Content-Disposition`.

mod disposition;

pub use disposition::ContentDisposition;

use futures::future::{AbortHandle, Abortable};
use regex::{Captures, Regex};
use reqwest::header::CONTENT_DISPOSITION;
use std::future::Future;
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;
use url::Url;

use crate::archive::ArchiveBlob;
use crate::error::{AcquisitionError, Error, Result};
use crate::io::HttpFetcher;

static PERCENT_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:%[0-9A-Fa-f]{2})+").unwrap());

/// Fetch the archive at `url`.
///
/// The display filename comes from `Content-Disposition` when the server sends
/// a usable one, otherwise from the last path segment of `url`.
#[tracing::instrument(skip_all, fields(url = url))]
pub async fn acquire(url: &str, timeout: Option<Duration>) -> Result<ArchiveBlob> {
    let fail = |source| Error::Acquisition {
        url: url.to_string(),
        source,
    };
    let parsed = Url::parse(url).map_err(|_| fail(AcquisitionError::UnsupportedUrl(url.into())))?;
    let mut filename = url_to_filename(url);

    match parsed.scheme() {
        "http" | "https" => {
            let fetcher = HttpFetcher::new(timeout).map_err(fail)?;
            let response = fetcher
                .fetch(url, |_status, headers| {
                    let disposition = headers
                        .get(CONTENT_DISPOSITION)
                        .and_then(|v| v.to_str().ok())
                        .map(ContentDisposition::parse);
                    if let Some(name) = disposition.as_ref().and_then(|d| d.filename()) {
                        filename = name.to_string();
                    }
                })
                .await
                .map_err(fail)?;
            tracing::info!(
                filename = %filename,
                transferred = fetcher.transferred_bytes(),
                "Acquired archive"
            );
            Ok(ArchiveBlob::new(filename, response.body))
        }
        "file" => {
            let path = parsed
                .to_file_path()
                .map_err(|_| fail(AcquisitionError::UnsupportedUrl(url.into())))?;
            let data = tokio::fs::read(&path)
                .await
                .map_err(|e| fail(AcquisitionError::LocalFile(e)))?;
            Ok(ArchiveBlob::new(filename, data))
        }
        _ => Err(fail(AcquisitionError::UnsupportedUrl(url.into()))),
    }
}

/// Like [`acquire`], but abortable through the returned handle.
///
/// An aborted fetch resolves to [`AcquisitionError::Aborted`] and never calls
/// back into the header handling again.
pub fn acquire_abortable(
    url: &str,
    timeout: Option<Duration>,
) -> (impl Future<Output = Result<ArchiveBlob>> + '_, AbortHandle) {
    let (handle, registration) = AbortHandle::new_pair();
    let fut = async move {
        match Abortable::new(acquire(url, timeout), registration).await {
            Ok(result) => result,
            Err(_aborted) => Err(Error::Acquisition {
                url: url.to_string(),
                source: AcquisitionError::Aborted,
            }),
        }
    };
    (fut, handle)
}

/// Accept a user supplied file. No network round trip is involved.
pub async fn accept_file(path: &Path) -> Result<ArchiveBlob> {
    let data = tokio::fs::read(path).await.map_err(|e| Error::Acquisition {
        url: path.display().to_string(),
        source: AcquisitionError::LocalFile(e),
    })?;
    let filename = path
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(ArchiveBlob::new(filename, data))
}

/// Last path segment of `url`, with query and fragment removed and
/// percent-escapes decoded where they form valid UTF-8.
pub fn url_to_filename(url: &str) -> String {
    let (name, _, _) = split_url(url);
    let name = name.rsplit('/').next().unwrap_or(name);
    decode_uri_component(name)
}

/// Split a URL into `(base, search, hash)`. `search` keeps its leading `?`
/// and `hash` its leading `#`; either is empty when absent.
pub fn split_url(url: &str) -> (&str, &str, &str) {
    let (rest, hash) = match url.find('#') {
        Some(pos) => url.split_at(pos),
        None => (url, ""),
    };
    let (name, search) = match rest.find('?') {
        Some(pos) => rest.split_at(pos),
        None => (rest, ""),
    };
    (name, search, hash)
}

/// Split a filename into `(stem, extension)` at the last `.`.
pub fn filename_parts(filename: &str) -> (&str, &str) {
    match filename.rfind('.') {
        Some(pos) => (&filename[..pos], &filename[pos + 1..]),
        None => (filename, ""),
    }
}

/// MIME type for a filename, with the web archive formats known explicitly.
pub fn mime_for_filename(filename: &str) -> String {
    let (_, ext) = filename_parts(filename);
    match ext.to_ascii_lowercase().as_str() {
        "maff" => "application/x-maff".to_string(),
        "htz" => "application/html+zip".to_string(),
        _ => mime_guess::from_path(filename)
            .first()
            .map(|m| m.to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string()),
    }
}

/// Decode every run of `%XX` escapes that forms valid UTF-8, leaving the rest
/// (including stray `%` signs) literal.
pub fn decode_uri_component(s: &str) -> String {
    PERCENT_RUN
        .replace_all(s, |caps: &Captures| {
            let run = &caps[0];
            decode_uri_component_strict(run).unwrap_or_else(|| run.to_string())
        })
        .into_owned()
}

/// Decode all escapes, failing when the result is not valid UTF-8.
pub(crate) fn decode_uri_component_strict(s: &str) -> Option<String> {
    urlencoding::decode(s).ok().map(|s| s.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("http://example.com/a/page.htz", "page.htz")]
    #[case("http://example.com/a/page.maff?x=1#top", "page.maff")]
    #[case("http://example.com/%E6%97%A5%E8%A8%98.htz", "日記.htz")]
    #[case("http://example.com/100%25.htz", "100%.htz")]
    #[case("http://example.com/bad%E6.htz", "bad%E6.htz")]
    #[case("http://example.com/50%off.htz", "50%off.htz")]
    #[case("http://example.com/dir/", "")]
    fn test_url_to_filename(#[case] url: &str, #[case] expected: &str) {
        assert_eq!(url_to_filename(url), expected);
    }

    #[rstest]
    #[case("http://a/b.htz?q=1#h", ("http://a/b.htz", "?q=1", "#h"))]
    #[case("http://a/b.htz#h?not-query", ("http://a/b.htz", "", "#h?not-query"))]
    #[case("http://a/b.htz", ("http://a/b.htz", "", ""))]
    fn test_split_url(#[case] url: &str, #[case] expected: (&str, &str, &str)) {
        assert_eq!(split_url(url), expected);
    }

    #[rstest]
    #[case("page.maff", "application/x-maff")]
    #[case("page.HTZ", "application/html+zip")]
    #[case("style.css", "text/css")]
    #[case("unknown", "application/octet-stream")]
    fn test_mime_for_filename(#[case] filename: &str, #[case] expected: &str) {
        assert_eq!(mime_for_filename(filename), expected);
    }

    #[tokio::test]
    async fn test_acquire_file_url() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("saved page.htz");
        std::fs::write(&path, b"PK\x05\x06").unwrap();
        let url = Url::from_file_path(&path).unwrap();

        let blob = acquire(url.as_str(), None).await.unwrap();
        assert_eq!(blob.filename(), "saved page.htz");
        assert_eq!(blob.mime(), "application/html+zip");
        assert_eq!(blob.bytes(), b"PK\x05\x06");
    }

    #[tokio::test]
    async fn test_acquire_unsupported_scheme() {
        let err = acquire("ftp://example.com/a.htz", None).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Acquisition { source: AcquisitionError::UnsupportedUrl(_), .. }
        ));
    }

    #[tokio::test]
    async fn test_accept_file_missing() {
        let err = accept_file(Path::new("/definitely/not/here.maff")).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Acquisition { source: AcquisitionError::LocalFile(_), .. }
        ));
    }
}
