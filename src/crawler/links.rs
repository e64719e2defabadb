//! Link discovery for fetched pages
//!
//! This module turns a parsed page into the list of next-hop URLs:
//! - Elements are selected with the configured CSS selector
//! - The link attribute (usually `href`) is resolved against the page URL
//! - URLs must match the pattern allow-list and use http(s)
//! - Nothing is returned once the page sits at the depth ceiling

use crate::url::{is_fetchable_scheme, LinkPatterns};
use crate::ConfigError;
use scraper::{Html, Selector};
use url::Url;

/// Extracts next-hop URLs from a document
///
/// # Link Extraction Rules
///
/// 1. If `depth >= max_depth`, nothing is returned. The ceiling applies to the
///    depth of the current page, so a page at the ceiling is fetched and
///    extracted but never expanded.
/// 2. Every element matching `selector` contributes its `attribute` value,
///    resolved against `base_url` (the page's own URL, not the seed).
/// 3. A URL survives if any of `patterns` matches it (empty list = all).
/// 4. Only `http` and `https` URLs survive.
///
/// Elements without the attribute and unresolvable values are skipped without
/// error. Duplicates are kept; the frontier absorbs them.
pub fn extract_links(
    document: &Html,
    base_url: &Url,
    depth: u32,
    max_depth: u32,
    selector: &Selector,
    attribute: &str,
    patterns: &LinkPatterns,
) -> Vec<Url> {
    if depth >= max_depth {
        return Vec::new();
    }

    let mut links = Vec::new();

    for element in document.select(selector) {
        let Some(value) = element.value().attr(attribute) else {
            continue;
        };

        let resolved = match base_url.join(value.trim()) {
            Ok(url) => url,
            Err(e) => {
                tracing::debug!("Skipping unresolvable link '{}' on {}: {}", value, base_url, e);
                continue;
            }
        };

        if !patterns.is_match(resolved.as_str()) {
            tracing::debug!("Link {} does not match any pattern, skipping", resolved);
            continue;
        }

        if !is_fetchable_scheme(&resolved) {
            tracing::debug!("Link {} has unsupported scheme, skipping", resolved);
            continue;
        }

        links.push(resolved);
    }

    links
}

/// Link extraction settings for one crawl run
#[derive(Debug, Clone)]
pub struct LinkExtractor {
    selector: Selector,
    attribute: String,
    patterns: LinkPatterns,
}

impl LinkExtractor {
    /// Builds an extractor, validating the selector
    pub fn new(selector: &str, attribute: &str, patterns: LinkPatterns) -> Result<Self, ConfigError> {
        let parsed = Selector::parse(selector).map_err(|e| ConfigError::InvalidSelector {
            selector: selector.to_string(),
            message: format!("{:?}", e),
        })?;

        Ok(Self {
            selector: parsed,
            attribute: attribute.to_string(),
            patterns,
        })
    }

    /// Extracts next-hop URLs from a parsed document
    pub fn extract(&self, document: &Html, base_url: &Url, depth: u32, max_depth: u32) -> Vec<Url> {
        extract_links(
            document,
            base_url,
            depth,
            max_depth,
            &self.selector,
            &self.attribute,
            &self.patterns,
        )
    }

    /// Parses `html` and extracts next-hop URLs
    ///
    /// The document is dropped before returning, so this is safe to call from
    /// async code between awaits.
    pub fn extract_from_html(&self, html: &str, base_url: &Url, depth: u32, max_depth: u32) -> Vec<Url> {
        if depth >= max_depth {
            return Vec::new();
        }
        let document = Html::parse_document(html);
        self.extract(&document, base_url, depth, max_depth)
    }
}
