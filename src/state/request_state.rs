/// Request state definitions for tracking crawl progress
///
/// A request moves `Pending -> InFlight -> Handled` exactly once. How it got to
/// `Handled` is recorded separately as a `RequestOutcome`.
use std::fmt;

/// Represents the current state of a request in the frontier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestState {
    /// Request is queued and waiting to be dequeued
    Pending,

    /// Request has been dequeued and is being fetched or extracted
    InFlight,

    /// Request has been marked handled; it is never processed again
    Handled,
}

impl RequestState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InFlight => "in_flight",
            Self::Handled => "handled",
        }
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a handled request finished
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestOutcome {
    /// Page was fetched and the page function completed
    Extracted,

    /// Page could not be fetched (network, timeout, TLS)
    FetchFailed,

    /// Page function returned an error or panicked, or its result could not be stored
    ExtractionFailed,
}

impl RequestOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Extracted => "extracted",
            Self::FetchFailed => "fetch_failed",
            Self::ExtractionFailed => "extraction_failed",
        }
    }
}

impl fmt::Display for RequestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
