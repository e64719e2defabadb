//! JSON lines dataset writer
//!
//! Every record becomes one line. A top-level array is a batch of records and
//! is written as one line per element, so a page function can emit many items
//! for one page.

use crate::crawler::Request;
use crate::output::stats::CrawlStats;
use crate::output::traits::{OutputResult, ResultSink};
use serde_json::Value;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::{Mutex, PoisonError};

pub struct JsonLinesSink {
    writer: Mutex<BufWriter<File>>,
}

impl JsonLinesSink {
    /// Opens `path` for appending, creating it if needed
    pub fn create(path: &Path) -> OutputResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        tracing::debug!("Writing dataset to {}", path.display());
        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
        })
    }
}

fn write_line(writer: &mut impl Write, value: &Value) -> OutputResult<()> {
    serde_json::to_writer(&mut *writer, value)?;
    writer.write_all(b"\n")?;
    Ok(())
}

impl ResultSink for JsonLinesSink {
    fn push_data(&self, _request: &Request, data: &Value) -> OutputResult<()> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        match data {
            Value::Array(items) => {
                for item in items {
                    write_line(&mut *writer, item)?;
                }
            }
            other => write_line(&mut *writer, other)?,
        }
        Ok(())
    }

    fn finalize(&self, _stats: &CrawlStats) -> OutputResult<()> {
        self.writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .flush()?;
        Ok(())
    }
}
