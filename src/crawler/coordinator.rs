//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the crawl loop that ties the other components
//! together:
//! - Seeding the frontier
//! - Running a pool of workers that share one frontier
//! - Fetching, link discovery and page function execution per request
//! - Run-level cancellation (deadline or external token)
//! - Collecting run statistics and finalizing the sink

use crate::config::{validate_crawler_config, Config, CrawlerConfig};
use crate::crawler::charset::CharsetDetector;
use crate::crawler::context::ExtractionContext;
use crate::crawler::executor::{execute, PageFunction};
use crate::crawler::fetcher::{build_http_client, Fetcher, DEFAULT_USER_AGENT};
use crate::crawler::frontier::{Frontier, Request};
use crate::crawler::links::LinkExtractor;
use crate::crawler::proxy::{NoProxy, ProxyProvider, RotatingProxies};
use crate::output::stats::CrawlCounters;
use crate::output::{open_sink, CrawlStats, ResultSink};
use crate::state::RequestOutcome;
use crate::url::LinkPatterns;
use crate::{ConfigError, ScrapeError};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Engine settings derived from a validated `CrawlerConfig`
#[derive(Debug, Clone)]
pub struct CrawlSettings {
    /// Seed URLs, enqueued at depth 0
    pub start_urls: Vec<String>,

    /// Link discovery, `None` when no selector is configured
    pub link_extractor: Option<LinkExtractor>,

    /// Depth ceiling; `u32::MAX` means unlimited
    pub max_depth: u32,

    pub request_timeout: Duration,
    pub workers: usize,
    pub max_retries: u32,
    pub retry_backoff: Duration,
    pub max_run_time: Option<Duration>,
    pub user_agent: String,

    /// Picks the encoding each page body is decoded with
    pub charset: CharsetDetector,
}

impl CrawlSettings {
    /// Validates the crawler section and compiles selector and patterns
    pub fn from_config(config: &CrawlerConfig) -> Result<Self, ConfigError> {
        validate_crawler_config(config)?;

        let link_extractor = match config.discovery_selector() {
            Some(selector) => Some(LinkExtractor::new(
                selector,
                config.link_attribute.trim(),
                LinkPatterns::compile(&config.link_patterns)?,
            )?),
            None => None,
        };

        Ok(Self {
            start_urls: config.start_urls.clone(),
            link_extractor,
            max_depth: config.max_depth.unwrap_or(u32::MAX),
            request_timeout: Duration::from_secs(config.request_timeout),
            workers: config.workers as usize,
            max_retries: config.max_retries,
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
            max_run_time: config.max_run_time.map(Duration::from_secs),
            user_agent: config
                .user_agent
                .clone()
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            charset: CharsetDetector::new(
                config.from_encoding.as_deref(),
                &config.exclude_encodings,
            )?,
        })
    }
}

/// Main crawler coordinator structure
pub struct Coordinator {
    settings: CrawlSettings,
    frontier: Arc<Frontier>,
    routine: Arc<dyn PageFunction>,
    fetchers: Vec<Fetcher>,
}

impl Coordinator {
    /// Creates a coordinator and one HTTP client per worker
    ///
    /// Each worker asks `proxies` for its endpoint once, here. A bad proxy
    /// URL therefore fails the run before anything is fetched or written.
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Ready to run
    /// * `Err(ScrapeError)` - A client or proxy could not be set up
    pub fn new(
        settings: CrawlSettings,
        routine: Arc<dyn PageFunction>,
        proxies: Arc<dyn ProxyProvider>,
    ) -> crate::Result<Self> {
        let workers = settings.workers.max(1);
        let mut fetchers = Vec::with_capacity(workers);

        for worker in 0..workers {
            let proxy = proxies.new_url();
            if proxy.is_some() {
                tracing::debug!("Worker {} will fetch through a proxy", worker);
            }
            let client =
                build_http_client(&settings.user_agent, settings.request_timeout, proxy.as_deref())?;
            fetchers.push(
                Fetcher::new(client)
                    .with_retries(settings.max_retries, settings.retry_backoff)
                    .with_charset(settings.charset.clone()),
            );
        }

        Ok(Self {
            settings,
            frontier: Arc::new(Frontier::new()),
            routine,
            fetchers,
        })
    }

    /// The frontier this coordinator crawls from
    pub fn frontier(&self) -> &Arc<Frontier> {
        &self.frontier
    }

    /// Runs the crawl until the frontier drains or `cancel` fires
    ///
    /// Page function results go to `sink`. On cancellation pending requests
    /// are left unprocessed; requests already in flight finish and are marked
    /// handled. The sink is finalized with the run statistics in every case.
    pub async fn run(
        &self,
        sink: Arc<dyn ResultSink>,
        cancel: CancellationToken,
    ) -> crate::Result<CrawlStats> {
        let start_time = Instant::now();
        let run_token = cancel.child_token();

        for seed in &self.settings.start_urls {
            if !self.frontier.enqueue(seed, 0) {
                tracing::warn!("Seed {} was not enqueued (duplicate or malformed)", seed);
            }
        }

        let deadline = self.settings.max_run_time.map(|limit| {
            let token = run_token.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = tokio::time::sleep(limit) => {
                        tracing::warn!("Run time limit of {:?} reached, stopping crawl", limit);
                        token.cancel();
                    }
                    _ = token.cancelled() => {}
                }
            })
        });

        tracing::info!(
            "Starting crawl with {} worker(s), {} seed(s)",
            self.fetchers.len(),
            self.frontier.pending_count()
        );

        let counters = Arc::new(CrawlCounters::default());
        let mut tasks = JoinSet::new();

        for (id, fetcher) in self.fetchers.iter().cloned().enumerate() {
            let worker = Worker {
                id,
                fetcher,
                frontier: self.frontier.clone(),
                link_extractor: self.settings.link_extractor.clone(),
                max_depth: self.settings.max_depth,
                routine: self.routine.clone(),
                sink: sink.clone(),
                counters: counters.clone(),
                cancel: run_token.clone(),
            };
            tasks.spawn(worker.run());
        }

        let mut worker_failure = None;
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                // A dead worker may hold a request in flight forever; stop
                // the others instead of waiting on it.
                tracing::error!("Worker task failed: {}", e);
                run_token.cancel();
                worker_failure.get_or_insert_with(|| e.to_string());
            }
        }

        let cancelled = run_token.is_cancelled();
        if let Some(handle) = deadline {
            handle.abort();
        }

        let stats = counters.snapshot(
            self.frontier.seen_count() as u64,
            cancelled,
            start_time.elapsed(),
        );

        sink.finalize(&stats)?;

        if let Some(message) = worker_failure {
            return Err(ScrapeError::Worker(message));
        }

        tracing::info!(
            "Crawl {}: {} request(s) handled in {:?}",
            if cancelled { "cancelled" } else { "completed" },
            stats.handled,
            stats.elapsed
        );

        Ok(stats)
    }
}

struct Worker {
    id: usize,
    fetcher: Fetcher,
    frontier: Arc<Frontier>,
    link_extractor: Option<LinkExtractor>,
    max_depth: u32,
    routine: Arc<dyn PageFunction>,
    sink: Arc<dyn ResultSink>,
    counters: Arc<CrawlCounters>,
    cancel: CancellationToken,
}

impl Worker {
    async fn run(self) {
        while let Some(request) = self.frontier.next_request(&self.cancel).await {
            let outcome = self.process(&request).await;
            self.frontier.mark_handled(&request, outcome);
            CrawlCounters::incr(&self.counters.handled);
        }
        tracing::debug!("Worker {} stopped", self.id);
    }

    /// Fetches, discovers links and extracts; never fails past this point
    async fn process(&self, request: &Request) -> RequestOutcome {
        tracing::info!("Fetching {}", request);

        let response = match self.fetcher.fetch(request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!("{}", e);
                CrawlCounters::incr(&self.counters.fetch_failures);
                return RequestOutcome::FetchFailed;
            }
        };

        if let Some(extractor) = &self.link_extractor {
            let links = extractor.extract_from_html(
                &response.text(),
                &response.final_url,
                request.depth,
                self.max_depth,
            );
            let added = links
                .iter()
                .filter(|link| self.frontier.enqueue_url(link, request.depth + 1))
                .count();
            tracing::debug!(
                "Found {} link(s) on {}, {} new",
                links.len(),
                request.url,
                added
            );
        }

        let ctx = ExtractionContext::new(response, self.frontier.clone(), self.max_depth);
        match execute(ctx, self.routine.as_ref(), self.sink.clone()).await {
            Ok(pushed) => {
                CrawlCounters::incr(&self.counters.extracted);
                if pushed {
                    CrawlCounters::incr(&self.counters.records_pushed);
                }
                RequestOutcome::Extracted
            }
            Err(e) => {
                tracing::error!("{}", e);
                CrawlCounters::incr(&self.counters.extraction_failures);
                RequestOutcome::ExtractionFailed
            }
        }
    }
}

/// Runs a complete crawl for a loaded configuration
///
/// Proxies come from the `[proxy]` section, if any. The dataset named by
/// `[output]` is opened only once the crawler is set up, so a failed setup
/// leaves no dataset or run record behind. The run stops early on the
/// configured run time limit or when `cancel` fires.
pub async fn run_crawl(
    config: &Config,
    config_hash: &str,
    routine: Arc<dyn PageFunction>,
    cancel: CancellationToken,
) -> crate::Result<CrawlStats> {
    let settings = CrawlSettings::from_config(&config.crawler)?;
    let proxies: Arc<dyn ProxyProvider> = match &config.proxy {
        Some(proxy) => Arc::new(RotatingProxies::from_config(proxy)),
        None => Arc::new(NoProxy),
    };

    let coordinator = Coordinator::new(settings, routine, proxies)?;
    let sink = open_sink(&config.output, config_hash)?;
    coordinator.run(sink, cancel).await
}
