//! Testing utilities and helpers
//!
//! - **[`time`]**: clock abstraction with a controllable [`MockClock`]
//! - **[`async_utils`]**: polling helpers for asynchronous assertions
//!
//! The clock types are not test-only: production code takes a [`Clock`] so
//! time-dependent policies (token buckets) can be driven deterministically.

pub mod async_utils;
pub mod time;

pub use async_utils::poll_until;
pub use time::{Clock, MockClock, SystemClock};
