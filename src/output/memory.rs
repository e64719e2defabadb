use crate::crawler::Request;
use crate::output::traits::{OutputResult, ResultSink};
use crate::output::stats::CrawlStats;
use serde_json::Value;
use std::sync::{Mutex, PoisonError};

/// One stored page function result
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub url: String,
    pub depth: u32,
    pub data: Value,
}

/// Collects records in memory, in push order
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<Record>>,
    stats: Mutex<Option<CrawlStats>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All records pushed so far
    pub fn records(&self) -> Vec<Record> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Just the data values, in push order
    pub fn values(&self) -> Vec<Value> {
        self.records().into_iter().map(|r| r.data).collect()
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stats passed to `finalize`, if the run has finished
    pub fn final_stats(&self) -> Option<CrawlStats> {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ResultSink for MemorySink {
    fn push_data(&self, request: &Request, data: &Value) -> OutputResult<()> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Record {
                url: request.url.to_string(),
                depth: request.depth,
                data: data.clone(),
            });
        Ok(())
    }

    fn finalize(&self, stats: &CrawlStats) -> OutputResult<()> {
        *self.stats.lock().unwrap_or_else(PoisonError::into_inner) = Some(stats.clone());
        Ok(())
    }
}
