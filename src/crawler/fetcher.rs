//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with a user agent, a timeout and an optional proxy
//! - GET requests returning status, headers and body
//! - Picking the character encoding the body is decoded with
//! - Bounded retries with exponential backoff for transport failures
//! - Error classification for logging

use crate::crawler::charset::CharsetDetector;
use crate::crawler::frontier::Request;
use crate::ScrapeError;
use encoding_rs::Encoding;
use reqwest::header::HeaderMap;
use reqwest::{Client, Proxy, StatusCode};
use scraper::Html;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Default user agent when none is configured
pub const DEFAULT_USER_AGENT: &str = concat!("soup-scraper/", env!("CARGO_PKG_VERSION"));

/// A fetched page
///
/// Any HTTP status counts as a successful fetch; only transport failures are
/// reported as `FetchError`.
#[derive(Debug, Clone)]
pub struct FetchResult {
    /// The request that was fetched
    pub request: Request,

    /// Final URL after redirects
    pub final_url: Url,

    /// HTTP status code
    pub status: StatusCode,

    /// Response headers
    pub headers: HeaderMap,

    /// Raw response body
    pub body: Vec<u8>,

    /// Encoding `text()` decodes the body with
    pub encoding: &'static Encoding,
}

impl FetchResult {
    /// Content-Type header value, if present
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }

    /// Body decoded with the detected encoding, replacing invalid sequences
    pub fn text(&self) -> String {
        let (text, _) = self.encoding.decode_with_bom_removal(&self.body);
        text.into_owned()
    }

    /// Parses the body as an HTML document
    ///
    /// `Html` is not `Send`; drop it before the next `.await`.
    pub fn html(&self) -> Html {
        Html::parse_document(&self.text())
    }
}

/// Classification of a transport failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    Timeout,
    Connect,
    Redirect,
    Body,
    Other,
}

impl FetchErrorKind {
    fn classify(error: &reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else if error.is_connect() {
            Self::Connect
        } else if error.is_redirect() {
            Self::Redirect
        } else if error.is_body() || error.is_decode() {
            Self::Body
        } else {
            Self::Other
        }
    }

    /// Returns true if another attempt could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout | Self::Connect | Self::Body)
    }
}

/// A failed fetch, tagged with the URL that failed
#[derive(Debug, Error)]
#[error("Failed to fetch {url} ({kind:?} after {attempts} attempt(s)): {source}")]
pub struct FetchError {
    pub url: String,
    pub kind: FetchErrorKind,
    pub attempts: u32,
    pub source: reqwest::Error,
}

/// Builds an HTTP client with proper configuration
///
/// The timeout bounds the whole request: connect, headers and body.
/// Without a proxy, environment proxy variables are ignored so the
/// configuration stays the single source of truth.
///
/// # Example
///
/// ```no_run
/// use soup_scraper::crawler::build_http_client;
/// use std::time::Duration;
///
/// let client = build_http_client("MyScraper/1.0", Duration::from_secs(10), None).unwrap();
/// ```
pub fn build_http_client(
    user_agent: &str,
    timeout: Duration,
    proxy: Option<&str>,
) -> Result<Client, ScrapeError> {
    let builder = Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .gzip(true)
        .brotli(true);

    let builder = match proxy {
        Some(proxy_url) => {
            let proxy = Proxy::all(proxy_url).map_err(|e| ScrapeError::Proxy {
                url: proxy_url.to_string(),
                message: e.to_string(),
            })?;
            builder.proxy(proxy)
        }
        None => builder.no_proxy(),
    };

    Ok(builder.build()?)
}

/// Fetches pages for one worker
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    max_retries: u32,
    retry_backoff: Duration,
    charset: CharsetDetector,
}

impl Fetcher {
    /// Creates a fetcher that attempts every request exactly once
    pub fn new(client: Client) -> Self {
        Self {
            client,
            max_retries: 0,
            retry_backoff: Duration::from_millis(500),
            charset: CharsetDetector::default(),
        }
    }

    /// Uses `charset` instead of plain detection to pick body encodings
    pub fn with_charset(mut self, charset: CharsetDetector) -> Self {
        self.charset = charset;
        self
    }

    /// Allows up to `max_retries` further attempts after a retryable failure,
    /// waiting `backoff`, `2 * backoff`, `4 * backoff`, ... in between
    pub fn with_retries(mut self, max_retries: u32, backoff: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_backoff = backoff;
        self
    }

    /// Fetches a request
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | Any HTTP status | Returned as `FetchResult` |
    /// | Timeout / connection failure / broken body | Retried up to `max_retries` times |
    /// | TLS, redirect and other errors | Immediate `FetchError` |
    ///
    /// Retries re-issue the same request; they never touch the frontier.
    pub async fn fetch(&self, request: &Request) -> Result<FetchResult, FetchError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.fetch_once(request).await {
                Ok(result) => return Ok(result),
                Err(source) => {
                    let kind = FetchErrorKind::classify(&source);
                    if kind.is_retryable() && attempt <= self.max_retries {
                        let delay = self.retry_backoff * 2u32.saturating_pow(attempt - 1);
                        tracing::warn!(
                            "Fetch of {} failed ({:?}), retrying in {:?} (attempt {}/{})",
                            request.url,
                            kind,
                            delay,
                            attempt,
                            self.max_retries + 1
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }

                    return Err(FetchError {
                        url: request.url.to_string(),
                        kind,
                        attempts: attempt,
                        source,
                    });
                }
            }
        }
    }

    async fn fetch_once(&self, request: &Request) -> Result<FetchResult, reqwest::Error> {
        let response = self.client.get(request.url.clone()).send().await?;

        let status = response.status();
        let final_url = response.url().clone();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();
        let encoding = self.charset.detect(&headers, &body);

        Ok(FetchResult {
            request: request.clone(),
            final_url,
            status,
            headers,
            body,
            encoding,
        })
    }
}
