//! Soup-Scraper: a depth-bounded web scraper
//!
//! This crate crawls outward from a set of seed URLs, optionally following links
//! that match a CSS selector and a regex allow-list, and runs a caller-supplied
//! page function against every fetched page. Whatever the page function returns
//! is forwarded to a result sink (JSON lines, SQLite, or memory).

pub mod config;
pub mod crawler;
pub mod functions;
pub mod output;
pub mod state;
pub mod url;

use thiserror::Error;

/// Main error type for Soup-Scraper operations
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("Proxy setup failed for {url}: {message}")]
    Proxy { url: String, message: String },

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("Worker task failed: {0}")]
    Worker(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid link pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("Invalid link selector '{selector}': {message}")]
    InvalidSelector { selector: String, message: String },

    #[error("Unknown page function: {0}")]
    UnknownPageFunction(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL: {0}")]
    MissingHost(String),
}

/// Result type alias for Soup-Scraper operations
pub type Result<T> = std::result::Result<T, ScrapeError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{
    page_function_async, page_function_fn, run_crawl, Coordinator, CrawlSettings,
    ExtractionContext, FetchResult, Frontier, PageFunction, Request,
};
pub use output::{CrawlStats, MemorySink, ResultSink};
pub use state::{RequestOutcome, RequestState};
pub use url::{normalize_url, LinkPatterns};
