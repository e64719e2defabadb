//! Soup-Scraper main entry point
//!
//! This is the command-line interface for the Soup-Scraper crawler.

use clap::Parser;
use soup_scraper::config::{load_config_with_hash, Config};
use soup_scraper::crawler::run_crawl;
use soup_scraper::functions::{builtin_page_function, BUILTIN_PAGE_FUNCTIONS};
use soup_scraper::output::print_statistics;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Soup-Scraper: a depth-bounded web scraper
///
/// Crawls outward from seed URLs, follows links matching a CSS selector and a
/// regex allow-list, and stores whatever the configured page function returns.
#[derive(Parser, Debug)]
#[command(name = "soup-scraper")]
#[command(version)]
#[command(about = "A depth-bounded web scraper", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG", required_unless_present = "list_functions")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long)]
    dry_run: bool,

    /// List the built-in page functions and exit
    #[arg(long, conflicts_with = "dry_run")]
    list_functions: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    if cli.list_functions {
        handle_list_functions();
        return Ok(());
    }

    let Some(config_path) = cli.config else {
        return Err("a configuration file is required".into());
    };

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", config_path.display());
    let (config, config_hash) = match load_config_with_hash(&config_path) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if cli.dry_run {
        handle_dry_run(&config)?;
    } else {
        handle_crawl(config, &config_hash).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("soup_scraper=info,warn"),
            1 => EnvFilter::new("soup_scraper=debug,info"),
            2 => EnvFilter::new("soup_scraper=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn handle_list_functions() {
    println!("Built-in page functions:");
    for (name, description) in BUILTIN_PAGE_FUNCTIONS {
        println!("  {:<12} {}", name, description);
    }
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    builtin_page_function(&config.extraction.page_function)?;
    let crawler = &config.crawler;

    println!("=== Soup-Scraper Dry Run ===\n");

    println!("Crawler Configuration:");
    match crawler.max_depth {
        Some(depth) => println!("  Max depth: {}", depth),
        None => println!("  Max depth: unlimited"),
    }
    match crawler.discovery_selector() {
        Some(selector) => println!(
            "  Link selector: {} (attribute '{}')",
            selector, crawler.link_attribute
        ),
        None => println!("  Link selector: none (seeds only)"),
    }
    println!("  Link patterns: {:?}", crawler.link_patterns);
    println!("  Request timeout: {}s", crawler.request_timeout);
    println!("  Workers: {}", crawler.workers);
    println!("  Max retries: {}", crawler.max_retries);
    if let Some(limit) = crawler.max_run_time {
        println!("  Max run time: {}s", limit);
    }
    if let Some(encoding) = &crawler.from_encoding {
        println!("  Page encoding: {}", encoding);
    }
    if !crawler.exclude_encodings.is_empty() {
        println!("  Excluded encodings: {:?}", crawler.exclude_encodings);
    }

    println!("\nProxies:");
    match &config.proxy {
        Some(proxy) if !proxy.urls.is_empty() => println!("  {} endpoint(s)", proxy.urls.len()),
        _ => println!("  none"),
    }

    println!("\nExtraction:");
    println!("  Page function: {}", config.extraction.page_function);

    println!("\nOutput:");
    println!("  Format: {:?}", config.output.format);
    println!("  Dataset: {}", config.output.dataset_path);

    println!("\nStart URLs ({}):", crawler.start_urls.len());
    for seed in &crawler.start_urls {
        println!("  - {}", seed);
    }

    println!("\n✓ Configuration is valid");

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, config_hash: &str) -> Result<(), Box<dyn std::error::Error>> {
    let routine = match builtin_page_function(&config.extraction.page_function) {
        Ok(routine) => routine,
        Err(e) => {
            tracing::error!("{}", e);
            return Err(e.into());
        }
    };

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received, finishing in-flight requests");
                cancel.cancel();
            }
        });
    }

    match run_crawl(&config, config_hash, routine, cancel).await {
        Ok(stats) => {
            tracing::info!("Dataset written to {}", config.output.dataset_path);
            print_statistics(&stats);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
