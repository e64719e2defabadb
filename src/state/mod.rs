//! State module for tracking request progress
//!
//! # Components
//!
//! - `RequestState`: Where a request sits in the frontier (pending, in flight, handled)
//! - `RequestOutcome`: How a handled request finished

mod request_state;

pub use request_state::{RequestOutcome, RequestState};
