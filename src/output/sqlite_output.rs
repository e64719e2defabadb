//! SQLite dataset writer
//!
//! Each run gets a row in `runs`; every record lands in `records` tagged with
//! the run, the page URL and its depth. Arrays are split into one row per
//! element, the same as the JSON lines writer.

use crate::crawler::Request;
use crate::output::stats::CrawlStats;
use crate::output::traits::{OutputResult, ResultSink};
use chrono::Utc;
use rusqlite::{params, Connection};
use serde_json::Value;
use std::path::Path;
use std::sync::{Mutex, PoisonError};

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL,
    stats TEXT
);

CREATE TABLE IF NOT EXISTS records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    url TEXT NOT NULL,
    depth INTEGER NOT NULL,
    data TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_records_run ON records(run_id);
CREATE INDEX IF NOT EXISTS idx_records_url ON records(url);
"#;

const STATUS_RUNNING: &str = "running";
const STATUS_COMPLETED: &str = "completed";
const STATUS_CANCELLED: &str = "cancelled";

/// Writes records to a SQLite database
pub struct SqliteSink {
    conn: Mutex<Connection>,
    run_id: i64,
}

impl SqliteSink {
    /// Opens (or creates) the database at `path` and starts a new run
    pub fn open(path: &Path, config_hash: &str) -> OutputResult<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
        ",
        )?;
        Self::with_connection(conn, config_hash)
    }

    /// In-memory database (for testing)
    #[cfg(test)]
    pub fn open_in_memory(config_hash: &str) -> OutputResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Self::with_connection(conn, config_hash)
    }

    fn with_connection(conn: Connection, config_hash: &str) -> OutputResult<Self> {
        conn.execute_batch(SCHEMA_SQL)?;
        conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![Utc::now().to_rfc3339(), config_hash, STATUS_RUNNING],
        )?;
        let run_id = conn.last_insert_rowid();
        tracing::debug!("Started dataset run {}", run_id);

        Ok(Self {
            conn: Mutex::new(conn),
            run_id,
        })
    }

    /// ID of the run this sink writes to
    pub fn run_id(&self) -> i64 {
        self.run_id
    }

    fn insert(&self, conn: &Connection, request: &Request, data: &Value) -> OutputResult<()> {
        conn.execute(
            "INSERT INTO records (run_id, url, depth, data, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                self.run_id,
                request.url.as_str(),
                request.depth,
                serde_json::to_string(data)?,
                Utc::now().to_rfc3339()
            ],
        )?;
        Ok(())
    }
}

impl ResultSink for SqliteSink {
    fn push_data(&self, request: &Request, data: &Value) -> OutputResult<()> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        match data {
            Value::Array(items) => {
                for item in items {
                    self.insert(&conn, request, item)?;
                }
            }
            other => self.insert(&conn, request, other)?,
        }
        Ok(())
    }

    fn finalize(&self, stats: &CrawlStats) -> OutputResult<()> {
        let status = if stats.cancelled {
            STATUS_CANCELLED
        } else {
            STATUS_COMPLETED
        };
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, stats = ?3 WHERE id = ?4",
            params![
                status,
                Utc::now().to_rfc3339(),
                serde_json::to_string(stats)?,
                self.run_id
            ],
        )?;
        Ok(())
    }
}
