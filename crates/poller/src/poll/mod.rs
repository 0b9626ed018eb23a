//! Recurring inventory polling.
//!
//! `diff` holds the pure snapshot comparison; `engine` drives the cycle
//! (fetch, diff, persist, fan out) on a fixed interval.

pub mod diff;
pub mod engine;

pub use engine::{CycleOutcome, InventoryFetcher, PollEngine, PollError, run_poll_loop};
