use serde::Deserialize;

/// Main configuration structure for Soup-Scraper
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub proxy: Option<ProxyConfig>,
    pub extraction: ExtractionConfig,
    pub output: OutputConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Seed URLs, always enqueued at depth 0
    #[serde(rename = "start-urls")]
    pub start_urls: Vec<String>,

    /// CSS selector for link discovery (empty disables discovery)
    #[serde(rename = "link-selector", default)]
    pub link_selector: Option<String>,

    /// Attribute holding the link target on selected elements
    #[serde(rename = "link-attribute", default = "default_link_attribute")]
    pub link_attribute: String,

    /// Regex allow-list for discovered links, anchored at the start of the URL
    #[serde(rename = "link-patterns", default = "default_link_patterns")]
    pub link_patterns: Vec<String>,

    /// Maximum number of link hops from a seed (absent means unlimited)
    #[serde(rename = "max-depth", default)]
    pub max_depth: Option<u32>,

    /// Timeout for a single fetch (seconds)
    #[serde(rename = "request-timeout", default = "default_request_timeout")]
    pub request_timeout: u64,

    /// Number of concurrent workers
    #[serde(default = "default_workers")]
    pub workers: u32,

    /// Number of additional fetch attempts after a transport failure
    #[serde(rename = "max-retries", default)]
    pub max_retries: u32,

    /// Base delay between fetch attempts (milliseconds), doubled per attempt
    #[serde(rename = "retry-backoff-ms", default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,

    /// Run-level deadline (seconds)
    #[serde(rename = "max-run-time", default)]
    pub max_run_time: Option<u64>,

    /// User agent sent with every request
    #[serde(rename = "user-agent", default)]
    pub user_agent: Option<String>,

    /// Character encoding forced on every page body, e.g. "windows-1252"
    #[serde(rename = "from-encoding", default)]
    pub from_encoding: Option<String>,

    /// Encodings never used to decode a body, even when a page declares them
    #[serde(rename = "exclude-encodings", default)]
    pub exclude_encodings: Vec<String>,
}

/// Proxy configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProxyConfig {
    /// Proxy endpoints, rotated across workers
    #[serde(default)]
    pub urls: Vec<String>,
}

/// Page function selection
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractionConfig {
    /// Name of a registered page function
    #[serde(rename = "page-function")]
    pub page_function: String,
}

/// Dataset output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Jsonl,
    Sqlite,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,

    /// Path to the dataset file
    #[serde(rename = "dataset-path")]
    pub dataset_path: String,
}

fn default_link_attribute() -> String {
    "href".to_string()
}

fn default_link_patterns() -> Vec<String> {
    vec![".*".to_string()]
}

fn default_request_timeout() -> u64 {
    10
}

fn default_workers() -> u32 {
    1
}

fn default_retry_backoff() -> u64 {
    500
}

impl CrawlerConfig {
    /// Creates a crawler config with defaults for everything except the seeds
    pub fn with_start_urls(start_urls: Vec<String>) -> Self {
        Self {
            start_urls,
            link_selector: None,
            link_attribute: default_link_attribute(),
            link_patterns: default_link_patterns(),
            max_depth: None,
            request_timeout: default_request_timeout(),
            workers: default_workers(),
            max_retries: 0,
            retry_backoff_ms: default_retry_backoff(),
            max_run_time: None,
            user_agent: None,
            from_encoding: None,
            exclude_encodings: Vec::new(),
        }
    }

    /// Returns the link selector if link discovery is enabled
    pub fn discovery_selector(&self) -> Option<&str> {
        self.link_selector
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}
