//! Best-effort URL rewriting for CSS text and `srcset` attributes.
//!
//! This is a lexical scanner, not a CSS parser. A single regex pass recognizes,
//! in priority order: comments (kept verbatim), `@import` rules, `@font-face`
//! blocks and bare `url(...)` tokens. Nesting is not tracked, and malformed CSS
//! may be rewritten incorrectly rather than rejected.
//!
//! Every rewritten URL is emitted as `url("...")`, whatever quoting the source
//! used.

use encoding_rs::Encoding;
use regex::{Captures, Regex};
use std::sync::LazyLock;

macro_rules! group {
    ($($part:expr),+ $(,)?) => {
        format!("(?:{})", [$(AsRef::<str>::as_ref(&$part)),+].join("|"))
    };
}

/// comment
const P_CM: &str = r"(?:/\*[\s\S]*?\*/)";
/// space equivalents
const P_SP: &str = r"(?:[ \t\r\n\v\f]*)";
/// a char, or an escaped char sequence
const P_CHAR: &str = r"(?:\\.|[^\\])";

struct Patterns {
    /// comment | @import (3 groups) | @font-face (1 group) | url() (1 group)
    main: Regex,
    /// `url(` prefix, argument, `)` suffix
    url: Regex,
}

static PATTERNS: LazyLock<Patterns> = LazyLock::new(|| {
    let cm_sp = format!("(?:{}*)", group!(P_CM, P_SP));
    let string = format!("(?:{P_CHAR}*?)");
    let spaced_string = format!("(?:{cm_sp}{string}{cm_sp})");
    let dq_string = format!(r#"(?:"{string}")"#);
    let sq_string = format!("(?:'{string}')");
    let embedded = format!("(?:{}*?)", group!(P_CM, &dq_string, &sq_string, P_CHAR));
    let url_arg = group!(&dq_string, &sq_string, &spaced_string);
    let url = format!(r"(?:url\({P_SP}{url_arg}{P_SP}\))");
    let url_caught = format!(
        r"(url\({P_SP})({}|{}|{})({P_SP}\))",
        dq_string, sq_string, spaced_string
    );
    let import = format!(
        r"(@import{cm_sp})({}|{}|{})({cm_sp};)",
        url, dq_string, sq_string
    );
    let font_face = format!(r"(@font-face{cm_sp}\{{{embedded}\}})");

    Patterns {
        main: Regex::new(&format!("(?i){P_CM}|{import}|{font_face}|({url})")).unwrap(),
        url: Regex::new(&format!("(?i){url_caught}")).unwrap(),
    }
});

static CSS_ESCAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\([0-9A-Fa-f]{1,6}) ?|\\(.)").unwrap());

static SRCSET_CANDIDATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\s*)([^ ,][^ ]*[^ ,])(\s*(?: [^ ,]+)?\s*(?:,|$))").unwrap());

static CHARSET_RULE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^@charset (?:"([\w-]+)"|'([\w-]+)');"#).unwrap());

static URL_SCHEME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*:").unwrap());

/// Substitutions applied by [`rewrite_css`], one per syntactic context.
pub trait CssUrlHandler {
    /// Target of an `@import` rule.
    fn import_url(&mut self, url: &str) -> String;
    /// A `url(...)` inside an `@font-face` block.
    fn font_face_url(&mut self, url: &str) -> String;
    /// Any other `url(...)`.
    fn background_url(&mut self, url: &str) -> String;
}

/// [`CssUrlHandler`] built from three closures.
pub struct UrlHandlers<I, F, B> {
    pub import: I,
    pub font_face: F,
    pub background: B,
}

impl<I, F, B> CssUrlHandler for UrlHandlers<I, F, B>
where
    I: FnMut(&str) -> String,
    F: FnMut(&str) -> String,
    B: FnMut(&str) -> String,
{
    fn import_url(&mut self, url: &str) -> String {
        (self.import)(url)
    }

    fn font_face_url(&mut self, url: &str) -> String {
        (self.font_face)(url)
    }

    fn background_url(&mut self, url: &str) -> String {
        (self.background)(url)
    }
}

/// Rewrite every URL reference in `css` through `handler`.
///
/// Never fails; text that doesn't match is passed through unchanged.
pub fn rewrite_css<H: CssUrlHandler + ?Sized>(css: &str, handler: &mut H) -> String {
    PATTERNS
        .main
        .replace_all(css, |caps: &Captures| {
            if let Some(target) = caps.get(2) {
                let target = target.as_str();
                let rewritten = match unquote(target) {
                    Some(inner) => {
                        let url = handler.import_url(&unescape_css(inner));
                        format!("url(\"{}\")", escape_quotes(&url))
                    }
                    None => rewrite_urls(target, &mut |u: &str| handler.import_url(u)),
                };
                format!("{}{}{}", &caps[1], rewritten, &caps[3])
            } else if caps.get(4).is_some() {
                rewrite_urls(&caps[0], &mut |u: &str| handler.font_face_url(u))
            } else if caps.get(5).is_some() {
                rewrite_urls(&caps[0], &mut |u: &str| handler.background_url(u))
            } else {
                caps[0].to_string()
            }
        })
        .into_owned()
}

/// Rewrite each `url(...)` token found in `text`.
fn rewrite_urls(text: &str, rewrite: &mut dyn FnMut(&str) -> String) -> String {
    PATTERNS
        .url
        .replace_all(text, |caps: &Captures| {
            let arg = &caps[2];
            let url = match unquote(arg) {
                Some(inner) => unescape_css(inner),
                None => unescape_css(arg.trim()),
            };
            format!("{}\"{}\"{}", &caps[1], escape_quotes(&rewrite(&url)), &caps[3])
        })
        .into_owned()
}

/// Strip matching single or double quotes.
fn unquote(s: &str) -> Option<&str> {
    if s.len() < 2 {
        return None;
    }
    let first = s.as_bytes()[0];
    let last = s.as_bytes()[s.len() - 1];
    match (first, last) {
        (b'"', b'"') | (b'\'', b'\'') => Some(&s[1..s.len() - 1]),
        _ => None,
    }
}

/// Rewrite the URL part of each `url [descriptor]` candidate of a `srcset`
/// list, keeping whitespace, descriptors and commas as they were.
pub fn rewrite_srcset<F: FnMut(&str) -> String>(srcset: &str, mut rewrite: F) -> String {
    SRCSET_CANDIDATE
        .replace_all(srcset, |caps: &Captures| {
            format!("{}{}{}", &caps[1], rewrite(&caps[2]), &caps[3])
        })
        .into_owned()
}

/// Resolve CSS escapes: `\XXXXXX` hex code points (one optional trailing space
/// consumed) and `\c` literal escapes.
pub fn unescape_css(s: &str) -> String {
    CSS_ESCAPE
        .replace_all(s, |caps: &Captures| {
            if let Some(hex) = caps.get(1) {
                u32::from_str_radix(hex.as_str(), 16)
                    .ok()
                    .and_then(char::from_u32)
                    .unwrap_or(char::REPLACEMENT_CHARACTER)
                    .to_string()
            } else {
                caps[2].to_string()
            }
        })
        .into_owned()
}

/// Backslash-escape backslashes and double quotes.
pub fn escape_quotes(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c == '\\' || c == '"' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Decode stylesheet bytes into text.
///
/// An explicit `charset` (e.g. from a `Content-Type` header) wins. Otherwise a
/// byte order mark or a leading `@charset` rule decides, and the decoded text is
/// prefixed with a BOM so it keeps being read as UTF-8 once re-encoded. Without
/// any hint the bytes are read as UTF-8, lossily.
pub fn decode_stylesheet(bytes: &[u8], charset: Option<&str>) -> String {
    if let Some(encoding) = charset.and_then(|c| Encoding::for_label(c.as_bytes())) {
        let (text, _) = encoding.decode_with_bom_removal(bytes);
        return text.into_owned();
    }

    let sniffed = Encoding::for_bom(bytes).map(|(encoding, _)| encoding).or_else(|| {
        let head = String::from_utf8_lossy(&bytes[..bytes.len().min(128)]);
        let caps = CHARSET_RULE.captures(&head)?;
        let label = caps.get(1).or_else(|| caps.get(2))?.as_str();
        Encoding::for_label(label.as_bytes())
    });

    match sniffed {
        Some(encoding) => {
            let (text, _) = encoding.decode_with_bom_removal(bytes);
            format!("\u{FEFF}{text}")
        }
        None => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// Point relative URLs of an archived stylesheet at `virtual_base`.
///
/// `css_path` is the stylesheet's own path inside the archive. A URL is
/// rewritten only when it resolves to a path for which `exists` holds;
/// absolute URLs, fragments and data URLs are left alone.
pub fn rebase_stylesheet<E>(css: &str, css_path: &str, virtual_base: &str, exists: E) -> String
where
    E: Fn(&str) -> bool,
{
    let rebase = |url: &str| -> String {
        let absolute = url.starts_with('/') || URL_SCHEME.is_match(url);
        if url.is_empty() || url.starts_with('#') || absolute {
            return url.to_string();
        }
        let split = url.find(['?', '#']).unwrap_or(url.len());
        let (path, suffix) = url.split_at(split);
        let Some(resolved) = resolve_relative(css_path, path) else {
            return url.to_string();
        };
        let lookup = crate::source::decode_uri_component(&resolved);
        if exists(&lookup) {
            format!("{virtual_base}{resolved}{suffix}")
        } else {
            url.to_string()
        }
    };

    let mut handlers = UrlHandlers {
        import: rebase,
        font_face: rebase,
        background: rebase,
    };
    rewrite_css(css, &mut handlers)
}

/// Join `relative` onto the directory of `base`, collapsing `.` and `..`.
/// Returns `None` when the path would climb above the archive root.
fn resolve_relative(base: &str, relative: &str) -> Option<String> {
    let mut segments: Vec<&str> = base.split('/').collect();
    segments.pop();
    for segment in relative.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            s => segments.push(s),
        }
    }
    Some(segments.join("/"))
}
