//! `Content-Disposition` header parsing (RFC 6266 style).
//!
//! `type; param=value; param*=charset'lang'value`. Extended (`*`) values are
//! percent-decoded using their declared charset and take precedence over the
//! plain parameter of the same name.

use std::collections::BTreeMap;

use super::decode_uri_component_strict;

/// A parsed `Content-Disposition` header value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentDisposition {
    /// `inline`, `attachment`, or whatever the server sent.
    pub kind: Option<String>,
    /// Parameter names are lower-cased; the `*` suffix is removed.
    pub parameters: BTreeMap<String, String>,
}

impl ContentDisposition {
    pub fn parse(header: &str) -> Self {
        let mut result = ContentDisposition::default();
        let mut parts = header.split(';');

        if let Some(kind) = parts.next().map(str::trim).filter(|k| !k.is_empty()) {
            result.kind = Some(kind.to_string());
        }

        let mut extended = BTreeMap::new();
        for part in parts {
            let Some((field, value)) = part.split_once('=') else {
                continue;
            };
            let field = field.trim().to_ascii_lowercase();
            let value = unquote(value.trim());

            match field.strip_suffix('*') {
                Some(name) => {
                    if let Some(decoded) = decode_ext_value(value) {
                        extended.insert(name.to_string(), decoded);
                    }
                }
                None => {
                    result.parameters.insert(field, value.to_string());
                }
            }
        }
        result.parameters.extend(extended);

        result
    }

    /// The `filename` parameter, if any.
    pub fn filename(&self) -> Option<&str> {
        self.parameters
            .get("filename")
            .map(String::as_str)
            .filter(|f| !f.is_empty())
    }
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

/// Decode `charset'lang'value`. Values without the charset prefix are kept verbatim.
fn decode_ext_value(value: &str) -> Option<String> {
    let mut pieces = value.splitn(3, '\'');
    let (Some(charset), Some(_lang), Some(encoded)) = (pieces.next(), pieces.next(), pieces.next())
    else {
        return Some(value.to_string());
    };

    match charset.to_ascii_lowercase().as_str() {
        "utf-8" => match decode_uri_component_strict(encoded) {
            Some(decoded) => Some(decoded),
            None => {
                tracing::warn!(value, "Malformed UTF-8 extended value in Content-Disposition");
                None
            }
        },
        "iso-8859-1" => {
            let bytes = urlencoding::decode_binary(encoded.as_bytes());
            Some(
                bytes
                    .iter()
                    .map(|&b| match b {
                        0x20..=0x7E | 0xA0..=0xFF => b as char,
                        _ => '?',
                    })
                    .collect(),
            )
        }
        other => {
            tracing::warn!(
                charset = other,
                "Unsupported charset in the extended field of Content-Disposition"
            );
            None
        }
    }
}
