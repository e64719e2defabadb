//! URL handling module for Soup-Scraper
//!
//! This module provides URL normalization (the identity used for request
//! de-duplication) and link-pattern matching for discovered links.

mod matcher;
mod normalize;

pub use matcher::LinkPatterns;
pub use normalize::normalize_url;

/// Returns true if the URL uses a scheme the crawler can fetch
pub fn is_fetchable_scheme(url: &url::Url) -> bool {
    matches!(url.scheme(), "http" | "https")
}
