//! Archive URL interception.
//!
//! Navigations to `.htz`/`.maff` URLs are redirected to the viewer page with
//! the archive URL in its `src` parameter. The viewer then fetches the archive
//! with `redirect_key` added to the query so the fetch itself is not
//! redirected again.

use regex::Regex;
use std::sync::LazyLock;
use url::Url;

static ARCHIVE_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\.(htz|maff)").unwrap());

/// Viewer URL for a top-level navigation to `request_url`, or `None` when the
/// request is not an archive or was already marked with `redirect_key`.
///
/// The request's fragment moves onto the viewer URL.
pub fn viewer_redirect(
    request_url: &str,
    viewer_page_url: &str,
    redirect_key: &str,
) -> Option<String> {
    let mut request = Url::parse(request_url).ok()?;
    let marked = request.query_pairs().any(|(k, _)| k == redirect_key);
    if marked || !ARCHIVE_PATH.is_match(request.path()) {
        return None;
    }

    let fragment = request.fragment().map(str::to_string);
    request.set_fragment(None);

    let mut viewer = Url::parse(viewer_page_url).ok()?;
    viewer.set_query(Some(&format!("src={}", urlencoding::encode(request.as_str()))));
    viewer.set_fragment(fragment.as_deref());
    tracing::debug!(from = request_url, to = %viewer, "Redirecting archive to viewer");
    Some(viewer.into())
}

/// What a viewer page URL asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewerRequest {
    /// Archive URL to fetch, with the redirect key set.
    pub source_url: String,
    /// Query string of the archive URL as requested, `?` included.
    pub search: String,
    /// Fragment of the viewer URL, `#` included.
    pub hash: String,
}

impl ViewerRequest {
    /// Parse a viewer page URL. `None` when it carries no usable `src`, or when
    /// it is a `reload` of a page that was already handled.
    pub fn parse(viewer_url: &str, redirect_key: &str) -> Option<Self> {
        let viewer = Url::parse(viewer_url).ok()?;
        if viewer.query_pairs().any(|(k, _)| k == "reload") {
            return None;
        }
        let src = viewer
            .query_pairs()
            .find(|(k, _)| k == "src")
            .map(|(_, v)| v.into_owned())?;
        let mut source = Url::parse(&src).ok()?;

        let search = prefixed('?', source.query());
        let hash = prefixed('#', viewer.fragment());

        let pairs: Vec<(String, String)> = source
            .query_pairs()
            .filter(|(k, _)| k != redirect_key)
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        source
            .query_pairs_mut()
            .clear()
            .extend_pairs(pairs)
            .append_pair(redirect_key, "1");

        Some(Self {
            source_url: source.into(),
            search,
            hash,
        })
    }
}

fn prefixed(prefix: char, part: Option<&str>) -> String {
    match part {
        Some(s) if !s.is_empty() => format!("{prefix}{s}"),
        _ => String::new(),
    }
}
