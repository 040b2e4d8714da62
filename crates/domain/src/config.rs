//! Controller configuration structures
//!
//! Loaded by the infrastructure layer from environment variables or a
//! TOML/JSON file; every field has a default so partial files work.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_BASE_DELAY_MS, DEFAULT_BUCKET_BURST, DEFAULT_BUCKET_QPS, DEFAULT_JOIN_TIMEOUT_MS,
    DEFAULT_MAX_DELAY_MS, DEFAULT_MAX_RETRIES, DEFAULT_WORKERS,
};
use crate::errors::{DomainError, Result};
use crate::impl_domain_enum_conversions;

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
    Json,
}

impl_domain_enum_conversions!(LogFormat {
    Pretty => "pretty",
    Compact => "compact",
    Json => "json",
});

/// How requeue delays are chosen for failed keys
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum RateLimiterConfig {
    /// Per-key exponential backoff combined with an overall token bucket
    Controller {
        #[serde(default = "default_base_delay_ms")]
        base_delay_ms: u64,
        #[serde(default = "default_max_delay_ms")]
        max_delay_ms: u64,
        #[serde(default = "default_qps")]
        qps: f64,
        #[serde(default = "default_burst")]
        burst: u32,
    },
    /// Per-key exponential backoff only
    Exponential {
        #[serde(default = "default_base_delay_ms")]
        base_delay_ms: u64,
        #[serde(default = "default_max_delay_ms")]
        max_delay_ms: u64,
    },
    /// Fixed fast delay for the first attempts, then a fixed slow delay
    FastSlow { fast_delay_ms: u64, slow_delay_ms: u64, max_fast_attempts: u32 },
    /// Overall token bucket only
    Bucket {
        #[serde(default = "default_qps")]
        qps: f64,
        #[serde(default = "default_burst")]
        burst: u32,
    },
}

fn default_base_delay_ms() -> u64 {
    DEFAULT_BASE_DELAY_MS
}

fn default_max_delay_ms() -> u64 {
    DEFAULT_MAX_DELAY_MS
}

fn default_qps() -> f64 {
    DEFAULT_BUCKET_QPS
}

fn default_burst() -> u32 {
    DEFAULT_BUCKET_BURST
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self::Controller {
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
            qps: DEFAULT_BUCKET_QPS,
            burst: DEFAULT_BUCKET_BURST,
        }
    }
}

/// Worker-loop configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Concurrent workers draining the queue
    pub workers: usize,
    /// Failed syncs of one key that are requeued before the key is dropped
    pub max_retries: u32,
    pub rate_limiter: RateLimiterConfig,
    /// How long `stop` waits for each worker to finish
    pub join_timeout_ms: u64,
    pub log_format: LogFormat,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            max_retries: DEFAULT_MAX_RETRIES,
            rate_limiter: RateLimiterConfig::default(),
            join_timeout_ms: DEFAULT_JOIN_TIMEOUT_MS,
            log_format: LogFormat::default(),
        }
    }
}

impl ControllerConfig {
    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }

    /// Validate the worker settings
    ///
    /// Limiter parameters are checked where the limiter is built.
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(DomainError::Config("workers must be at least 1".to_string()));
        }
        if self.join_timeout_ms == 0 {
            return Err(DomainError::Config("join_timeout_ms must be greater than 0".to_string()));
        }
        Ok(())
    }
}
