//! Character encoding detection for page bodies
//!
//! Pages are fetched as bytes and decoded once an encoding is picked, in this
//! order: the configured override, a byte order mark, the `charset` parameter
//! of the Content-Type header, a `<meta>` declaration near the top of the
//! document, then UTF-8 when the body is valid UTF-8, else windows-1252.
//! Excluded encodings are skipped at every step.

use crate::ConfigError;
use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use regex::bytes::Regex;
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use std::sync::LazyLock;

/// How far into the body a `<meta>` charset declaration is looked for
const META_SNIFF_LIMIT: usize = 1024;

static META_CHARSET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta[^>]*?charset\s*=\s*["']?\s*([a-z0-9_.:\-]+)"#)
        .expect("hardcoded regex pattern is valid")
});

/// Picks the encoding used to turn a response body into text
#[derive(Debug, Clone, Default)]
pub struct CharsetDetector {
    from_encoding: Option<&'static Encoding>,
    exclude: Vec<&'static Encoding>,
}

impl CharsetDetector {
    /// Resolves encoding labels ("latin1", "Shift_JIS", "utf-8", ...)
    ///
    /// Unknown labels are configuration errors.
    pub fn new(from_encoding: Option<&str>, exclude: &[String]) -> Result<Self, ConfigError> {
        let from_encoding = from_encoding
            .map(str::trim)
            .filter(|label| !label.is_empty())
            .map(resolve_label)
            .transpose()?;

        let exclude = exclude
            .iter()
            .map(|label| resolve_label(label.trim()))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            from_encoding,
            exclude,
        })
    }

    /// Returns the encoding for a body served with `headers`
    pub fn detect(&self, headers: &HeaderMap, body: &[u8]) -> &'static Encoding {
        let declared = [
            self.from_encoding,
            Encoding::for_bom(body).map(|(encoding, _)| encoding),
            header_charset(headers),
            meta_charset(body),
        ];

        if let Some(encoding) = declared
            .into_iter()
            .flatten()
            .find(|encoding| self.allows(*encoding))
        {
            return encoding;
        }

        if self.allows(UTF_8) && std::str::from_utf8(body).is_ok() {
            UTF_8
        } else if self.allows(WINDOWS_1252) {
            WINDOWS_1252
        } else {
            UTF_8
        }
    }

    fn allows(&self, encoding: &'static Encoding) -> bool {
        !self.exclude.contains(&encoding)
    }
}

fn resolve_label(label: &str) -> Result<&'static Encoding, ConfigError> {
    Encoding::for_label_no_replacement(label.as_bytes())
        .ok_or_else(|| ConfigError::Validation(format!("Unknown character encoding '{}'", label)))
}

fn header_charset(headers: &HeaderMap) -> Option<&'static Encoding> {
    let content_type: mime::Mime = headers.get(CONTENT_TYPE)?.to_str().ok()?.parse().ok()?;
    let charset = content_type.get_param(mime::CHARSET)?;
    Encoding::for_label_no_replacement(charset.as_str().as_bytes())
}

fn meta_charset(body: &[u8]) -> Option<&'static Encoding> {
    let head = &body[..body.len().min(META_SNIFF_LIMIT)];
    let label = META_CHARSET.captures(head)?.get(1)?;
    let encoding = Encoding::for_label_no_replacement(label.as_bytes())?;
    // A document that could declare itself in ASCII is not UTF-16
    if encoding == encoding_rs::UTF_16LE || encoding == encoding_rs::UTF_16BE {
        Some(UTF_8)
    } else {
        Some(encoding)
    }
}
