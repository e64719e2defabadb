//! The handle given to page functions

use crate::crawler::fetcher::FetchResult;
use crate::crawler::frontier::{Frontier, Request};
use anyhow::anyhow;
use scraper::{Html, Selector};
use std::sync::Arc;
use url::Url;

struct ContextInner {
    response: FetchResult,
    frontier: Arc<Frontier>,
    max_depth: u32,
}

/// Everything a page function may look at or act on for one page
///
/// Cloning is cheap; clones share the same response and frontier.
#[derive(Clone)]
pub struct ExtractionContext {
    inner: Arc<ContextInner>,
}

impl ExtractionContext {
    pub fn new(response: FetchResult, frontier: Arc<Frontier>, max_depth: u32) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                response,
                frontier,
                max_depth,
            }),
        }
    }

    /// The request being processed
    pub fn request(&self) -> &Request {
        &self.inner.response.request
    }

    /// Final URL of the page after redirects
    pub fn url(&self) -> &Url {
        &self.inner.response.final_url
    }

    /// The fetched response
    pub fn response(&self) -> &FetchResult {
        &self.inner.response
    }

    /// Response body as text
    pub fn text(&self) -> String {
        self.inner.response.text()
    }

    /// Parses the response body
    ///
    /// `Html` is not `Send`. Async page functions must drop it before their
    /// next `.await`.
    pub fn html(&self) -> Html {
        self.inner.response.html()
    }

    /// Trimmed text of every element matching `selector`
    pub fn select(&self, selector: &str) -> anyhow::Result<Vec<String>> {
        let selector = parse_selector(selector)?;
        let document = self.html();
        Ok(document
            .select(&selector)
            .map(|el| el.text().collect::<String>().trim().to_string())
            .collect())
    }

    /// Value of `attribute` on every element matching `selector` that has it
    pub fn select_attr(&self, selector: &str, attribute: &str) -> anyhow::Result<Vec<String>> {
        let selector = parse_selector(selector)?;
        let document = self.html();
        Ok(document
            .select(&selector)
            .filter_map(|el| el.value().attr(attribute))
            .map(str::to_string)
            .collect())
    }

    /// Schedules another URL one hop below this page
    ///
    /// Relative URLs resolve against the page URL. Nothing is enqueued when
    /// this page already sits at the depth ceiling, or when the URL was seen
    /// before. Returns true if the URL was newly added.
    pub fn enqueue(&self, url: &str) -> bool {
        let depth = self.request().depth;
        if depth >= self.inner.max_depth {
            tracing::debug!("Not enqueuing {} from {}: depth ceiling reached", url, self.url());
            return false;
        }
        self.inner
            .frontier
            .enqueue_with_base(url, Some(self.url()), depth + 1)
    }
}

fn parse_selector(selector: &str) -> anyhow::Result<Selector> {
    Selector::parse(selector).map_err(|e| anyhow!("invalid selector '{}': {:?}", selector, e))
}
