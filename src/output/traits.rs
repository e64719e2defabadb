//! Result sink trait and output errors

use crate::crawler::Request;
use crate::output::stats::CrawlStats;
use serde_json::Value;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write output: {0}")]
    Write(String),

    #[error("Failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Destination for extracted records
///
/// Sinks are shared by all workers, so implementations must be thread-safe.
/// `push_data` is called once per page function result, in completion order.
pub trait ResultSink: Send + Sync {
    /// Stores one page function result for `request`
    fn push_data(&self, request: &Request, data: &Value) -> OutputResult<()>;

    /// Flushes buffered output and records the run summary
    ///
    /// Called once after the last worker has stopped.
    fn finalize(&self, _stats: &CrawlStats) -> OutputResult<()> {
        Ok(())
    }
}
