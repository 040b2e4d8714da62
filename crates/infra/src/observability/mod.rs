//! Logging setup
//!
//! Library code only emits `tracing` events; the binary embedding the
//! controller decides where they go by calling [`init_logging`] once.

mod logging;

pub use logging::{init_logging, DEFAULT_FILTER};
