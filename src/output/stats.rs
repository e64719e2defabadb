//! Run statistics
//!
//! Workers bump shared atomic counters while the crawl runs; a `CrawlStats`
//! snapshot is taken once at the end and handed to the sink and the binary.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Summary of one crawl run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CrawlStats {
    /// URLs accepted by the frontier, seeds included
    pub enqueued: u64,

    /// Requests marked handled, whatever their outcome
    pub handled: u64,

    /// Requests whose page function completed
    pub extracted: u64,

    /// Requests that could not be fetched
    pub fetch_failures: u64,

    /// Requests whose page function failed, panicked, or could not be stored
    pub extraction_failures: u64,

    /// Records forwarded to the sink
    pub records_pushed: u64,

    /// Whether the run stopped on cancellation or deadline
    pub cancelled: bool,

    /// Wall-clock duration of the run
    #[serde(serialize_with = "serialize_duration_secs")]
    pub elapsed: Duration,
}

impl CrawlStats {
    /// Share of handled requests that were extracted, as a percentage
    pub fn success_rate(&self) -> f64 {
        if self.handled == 0 {
            return 0.0;
        }
        (self.extracted as f64 / self.handled as f64) * 100.0
    }

    /// Handled requests per second
    pub fn pages_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs == 0.0 {
            return 0.0;
        }
        self.handled as f64 / secs
    }
}

fn serialize_duration_secs<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

/// Live counters shared by the workers of one run
#[derive(Debug, Default)]
pub struct CrawlCounters {
    pub handled: AtomicU64,
    pub extracted: AtomicU64,
    pub fetch_failures: AtomicU64,
    pub extraction_failures: AtomicU64,
    pub records_pushed: AtomicU64,
}

impl CrawlCounters {
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Freezes the counters into a `CrawlStats`
    pub fn snapshot(&self, enqueued: u64, cancelled: bool, elapsed: Duration) -> CrawlStats {
        CrawlStats {
            enqueued,
            handled: self.handled.load(Ordering::Relaxed),
            extracted: self.extracted.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
            extraction_failures: self.extraction_failures.load(Ordering::Relaxed),
            records_pushed: self.records_pushed.load(Ordering::Relaxed),
            cancelled,
            elapsed,
        }
    }
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CrawlStats) {
    println!("=== Crawl Statistics ===\n");

    println!("Overview:");
    println!("  URLs enqueued: {}", stats.enqueued);
    println!("  Requests handled: {}", stats.handled);
    println!("  Records stored: {}", stats.records_pushed);
    println!(
        "  Elapsed: {:.1}s ({:.2} pages/sec)",
        stats.elapsed.as_secs_f64(),
        stats.pages_per_second()
    );
    println!();

    println!("Outcomes:");
    println!("  Extracted: {}", stats.extracted);
    println!("  Fetch failures: {}", stats.fetch_failures);
    println!("  Extraction failures: {}", stats.extraction_failures);
    println!();

    if stats.cancelled {
        println!(
            "Run was cancelled; {} enqueued URL(s) were not processed",
            stats.enqueued.saturating_sub(stats.handled)
        );
        println!();
    }

    println!(
        "Success Rate: {:.1}% ({} / {} requests extracted)",
        stats.success_rate(),
        stats.extracted,
        stats.handled
    );
}
