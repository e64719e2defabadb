//! Output module: where extracted records go
//!
//! This module handles:
//! - The `ResultSink` trait page function results are forwarded to
//! - JSON lines, SQLite and in-memory sinks
//! - Run statistics

mod jsonl;
mod memory;
mod sqlite_output;
pub mod stats;
mod traits;

pub use jsonl::JsonLinesSink;
pub use memory::{MemorySink, Record};
pub use sqlite_output::SqliteSink;
pub use stats::{print_statistics, CrawlStats};
pub use traits::{OutputError, OutputResult, ResultSink};

use crate::config::{OutputConfig, OutputFormat};
use std::path::Path;
use std::sync::Arc;

/// Opens the sink selected by the output configuration
///
/// # Arguments
///
/// * `config` - Output section of the configuration
/// * `config_hash` - Hash of the configuration file, recorded with SQLite runs
pub fn open_sink(config: &OutputConfig, config_hash: &str) -> OutputResult<Arc<dyn ResultSink>> {
    let path = Path::new(&config.dataset_path);
    let sink: Arc<dyn ResultSink> = match config.format {
        OutputFormat::Jsonl => Arc::new(JsonLinesSink::create(path)?),
        OutputFormat::Sqlite => Arc::new(SqliteSink::open(path, config_hash)?),
    };
    Ok(sink)
}
