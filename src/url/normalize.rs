use crate::UrlError;
use url::Url;

/// Normalizes a URL into the form used as request identity
///
/// # Normalization Steps
///
/// 1. Resolve against `base` when given (standard URL join), otherwise parse as absolute
/// 2. Reject anything that is not `http` or `https`
/// 3. Reject URLs without a host
/// 4. Remove the fragment (everything after #)
/// 5. Remove an empty query string (trailing ?)
///
/// Host lowercasing, default port removal and dot-segment removal are already
/// performed by the `url` parser. The query is kept byte for byte, since the
/// normalized URL is also the URL that gets fetched.
///
/// # Examples
///
/// ```
/// use soup_scraper::url::normalize_url;
///
/// let url = normalize_url("https://EXAMPLE.com/page?b=2&a=1#top", None).unwrap();
/// assert_eq!(url.as_str(), "https://example.com/page?b=2&a=1");
/// ```
pub fn normalize_url(url_str: &str, base: Option<&Url>) -> Result<Url, UrlError> {
    let url_str = url_str.trim();

    let mut url = match base {
        Some(base) => base.join(url_str),
        None => Url::parse(url_str),
    }
    .map_err(|e| UrlError::Parse(format!("{}: {}", url_str, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::MissingHost(url_str.to_string()));
    }

    url.set_fragment(None);

    if url.query() == Some("") {
        url.set_query(None);
    }

    Ok(url)
}
