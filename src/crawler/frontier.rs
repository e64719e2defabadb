//! Request frontier: FIFO queue, de-duplication and in-flight bookkeeping
//!
//! The frontier is the only shared mutable state of a crawl. Every operation
//! takes a single mutex for a short, synchronous critical section, so it is
//! safe to share one frontier between any number of workers.
//!
//! Invariants:
//! - a URL (after normalization) is enqueued at most once per frontier lifetime
//! - requests are dequeued in insertion order
//! - each request is in exactly one of pending, in flight, handled
//! - the crawl is finished only when nothing is pending *and* nothing is in flight

use crate::state::{RequestOutcome, RequestState};
use crate::url::normalize_url;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use url::Url;

/// A URL scheduled for crawling
///
/// Identity is the normalized URL. The depth is fixed when the request is
/// created: 0 for seeds, parent depth + 1 for discovered links.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Request {
    /// Normalized absolute URL
    pub url: Url,

    /// Number of link hops from a seed
    pub depth: u32,
}

impl Request {
    /// The de-duplication key of this request
    pub fn unique_key(&self) -> &str {
        self.url.as_str()
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (depth {})", self.url, self.depth)
    }
}

#[derive(Default)]
struct FrontierState {
    /// Pending requests in FIFO order
    queue: VecDeque<Request>,

    /// Every URL ever enqueued, including handled ones
    seen: HashSet<String>,

    /// URLs currently dequeued but not yet handled
    in_flight: HashSet<String>,

    /// Handled URLs with their outcome
    handled: HashMap<String, RequestOutcome>,
}

impl FrontierState {
    fn pop_pending(&mut self) -> Option<Request> {
        let request = self.queue.pop_front()?;
        self.in_flight.insert(request.unique_key().to_string());
        Some(request)
    }

    fn is_drained(&self) -> bool {
        self.queue.is_empty() && self.in_flight.is_empty()
    }
}

/// In-memory request frontier shared by all workers
pub struct Frontier {
    state: Mutex<FrontierState>,
    changed: Notify,
}

impl Default for Frontier {
    fn default() -> Self {
        Self::new()
    }
}

impl Frontier {
    /// Creates an empty frontier
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FrontierState::default()),
            changed: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, FrontierState> {
        // A panicking holder cannot leave the state half-updated: every
        // critical section performs its mutations after all fallible work.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueues an absolute URL at the given depth
    ///
    /// Returns true if the URL was newly added. Duplicates and malformed URLs
    /// are silently skipped.
    pub fn enqueue(&self, url: &str, depth: u32) -> bool {
        self.enqueue_with_base(url, None, depth)
    }

    /// Enqueues a URL, resolving it against `base` first when it is relative
    pub fn enqueue_with_base(&self, url: &str, base: Option<&Url>, depth: u32) -> bool {
        match normalize_url(url, base) {
            Ok(normalized) => self.insert(normalized, depth),
            Err(e) => {
                tracing::debug!("Not enqueuing {}: {}", url, e);
                false
            }
        }
    }

    /// Enqueues an already parsed URL
    pub fn enqueue_url(&self, url: &Url, depth: u32) -> bool {
        self.enqueue_with_base(url.as_str(), None, depth)
    }

    fn insert(&self, url: Url, depth: u32) -> bool {
        let added = {
            let mut state = self.lock();
            if state.seen.contains(url.as_str()) {
                false
            } else {
                state.seen.insert(url.as_str().to_string());
                state.queue.push_back(Request {
                    url: url.clone(),
                    depth,
                });
                true
            }
        };

        if added {
            tracing::info!("Enqueued {} (depth {})", url, depth);
            self.changed.notify_waiters();
        } else {
            tracing::debug!("Already seen, skipping {}", url);
        }

        added
    }

    /// Takes the next pending request without waiting
    ///
    /// The returned request is in flight until passed to `mark_handled`.
    /// Returns `None` when nothing is pending right now; other workers may
    /// still add requests, so use `next_request` to wait for termination.
    pub fn dequeue(&self) -> Option<Request> {
        self.lock().pop_pending()
    }

    /// Waits for the next pending request
    ///
    /// Returns `None` once the frontier is drained (nothing pending and nothing
    /// in flight) or the token is cancelled.
    pub async fn next_request(&self, cancel: &CancellationToken) -> Option<Request> {
        loop {
            // Registered before inspecting the state so a notification sent
            // between the check and the await is not lost.
            let changed = self.changed.notified();

            if cancel.is_cancelled() {
                return None;
            }

            {
                let mut state = self.lock();
                if let Some(request) = state.pop_pending() {
                    return Some(request);
                }
                if state.in_flight.is_empty() {
                    return None;
                }
            }

            tokio::select! {
                _ = changed => {}
                _ = cancel.cancelled() => return None,
            }
        }
    }

    /// Moves an in-flight request to handled
    ///
    /// Returns false (and changes nothing) if the request is not in flight,
    /// e.g. when called twice for the same request.
    pub fn mark_handled(&self, request: &Request, outcome: RequestOutcome) -> bool {
        let key = request.unique_key();
        let marked = {
            let mut state = self.lock();
            if state.in_flight.remove(key) {
                state.handled.insert(key.to_string(), outcome);
                true
            } else {
                false
            }
        };

        if marked {
            tracing::debug!("Handled {} ({})", key, outcome);
            self.changed.notify_waiters();
        } else {
            tracing::warn!("mark_handled called for {} which is not in flight", key);
        }

        marked
    }

    /// Returns the state of a URL, or `None` if it was never enqueued
    pub fn state_of(&self, url: &str) -> Option<RequestState> {
        let key = normalize_url(url, None).ok()?;
        let key = key.as_str();
        let state = self.lock();

        if state.handled.contains_key(key) {
            Some(RequestState::Handled)
        } else if state.in_flight.contains(key) {
            Some(RequestState::InFlight)
        } else if state.seen.contains(key) {
            Some(RequestState::Pending)
        } else {
            None
        }
    }

    /// Returns the outcome of a handled URL
    pub fn outcome_of(&self, url: &str) -> Option<RequestOutcome> {
        let key = normalize_url(url, None).ok()?;
        self.lock().handled.get(key.as_str()).copied()
    }

    /// Returns all handled URLs, sorted
    pub fn handled_urls(&self) -> Vec<String> {
        let mut urls: Vec<String> = self.lock().handled.keys().cloned().collect();
        urls.sort();
        urls
    }

    /// Number of URLs ever enqueued
    pub fn seen_count(&self) -> usize {
        self.lock().seen.len()
    }

    /// Number of requests waiting to be dequeued
    pub fn pending_count(&self) -> usize {
        self.lock().queue.len()
    }

    /// Number of requests dequeued but not yet handled
    pub fn in_flight_count(&self) -> usize {
        self.lock().in_flight.len()
    }

    /// Number of handled requests
    pub fn handled_count(&self) -> usize {
        self.lock().handled.len()
    }

    /// Returns true if nothing is pending and nothing is in flight
    pub fn is_finished(&self) -> bool {
        self.lock().is_drained()
    }
}
