//! Crawler module for web page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - The request frontier (dedup, FIFO order, in-flight tracking)
//! - HTTP fetching with timeouts, proxies and bounded retries
//! - Character encoding detection for page bodies
//! - Link discovery with selector, pattern, scheme and depth filters
//! - Page function execution and result forwarding
//! - Overall crawl coordination across workers

mod charset;
mod context;
mod coordinator;
mod executor;
mod fetcher;
mod frontier;
mod links;
mod proxy;

pub use charset::CharsetDetector;
pub use context::ExtractionContext;
pub use coordinator::{run_crawl, Coordinator, CrawlSettings};
pub use executor::{
    execute, page_function_async, page_function_fn, ExtractionError, PageFunction,
};
pub use fetcher::{
    build_http_client, FetchError, FetchErrorKind, FetchResult, Fetcher, DEFAULT_USER_AGENT,
};
pub use frontier::{Frontier, Request};
pub use links::{extract_links, LinkExtractor};
pub use proxy::{NoProxy, ProxyProvider, RotatingProxies};
