//! Domain constants
//!
//! Defaults shared by configuration parsing and the worker loop.

/// Separator between namespace and name in an object key
pub const KEY_SEPARATOR: char = '/';

// Controller defaults
pub const DEFAULT_WORKERS: usize = 1;
pub const DEFAULT_MAX_RETRIES: u32 = 15;
pub const DEFAULT_JOIN_TIMEOUT_MS: u64 = 5_000;

// Requeue rate limiter defaults
pub const DEFAULT_BASE_DELAY_MS: u64 = 5;
pub const DEFAULT_MAX_DELAY_MS: u64 = 1_000_000;
pub const DEFAULT_BUCKET_QPS: f64 = 10.0;
pub const DEFAULT_BUCKET_BURST: u32 = 100;
