//! Configuration loader
//!
//! ## Loading Strategy
//! 1. Attempt to load from environment variables
//! 2. If a required variable is missing or invalid, fall back to a file
//! 3. Probe standard locations when no file path is given
//! 4. Validate whatever was loaded
//!
//! ## Environment Variables
//! - `SYNCLOOP_WORKERS` (required): number of workers
//! - `SYNCLOOP_MAX_RETRIES` (required): requeues before a key is dropped
//! - `SYNCLOOP_BASE_DELAY_MS`, `SYNCLOOP_MAX_DELAY_MS`: per-key backoff
//! - `SYNCLOOP_QPS`, `SYNCLOOP_BURST`: overall token bucket
//! - `SYNCLOOP_JOIN_TIMEOUT_MS`: how long `stop` waits per worker
//! - `SYNCLOOP_LOG_FORMAT`: `pretty`, `compact` or `json`
//!
//! Optional variables fall back to their defaults.
//!
//! ## File Locations
//! The loader probes, in order, the current directory and then the
//! executable's directory for `syncloop.toml`, `syncloop.json`,
//! `config.toml` and `config.json`.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use syncloop_domain::constants::{
    DEFAULT_BASE_DELAY_MS, DEFAULT_BUCKET_BURST, DEFAULT_BUCKET_QPS, DEFAULT_JOIN_TIMEOUT_MS,
    DEFAULT_MAX_DELAY_MS,
};
use syncloop_common::error::CommonError;
use syncloop_domain::{ControllerConfig, DomainError, LogFormat, RateLimiterConfig, Result};

use crate::controller::build_rate_limiter;
use crate::errors::ControllerError;

const CONFIG_FILE_NAMES: [&str; 4] = ["syncloop.toml", "syncloop.json", "config.toml", "config.json"];

/// Load configuration with automatic fallback strategy
///
/// # Errors
/// Returns `DomainError::Config` if neither source yields a valid
/// configuration.
pub fn load() -> Result<ControllerConfig> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = %e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// # Errors
/// Returns `DomainError::Config` if a required variable is missing, a value
/// does not parse, or the result fails validation.
pub fn load_from_env() -> Result<ControllerConfig> {
    let workers: usize = parse_env("SYNCLOOP_WORKERS", env_var("SYNCLOOP_WORKERS")?)?;
    let max_retries: u32 = parse_env("SYNCLOOP_MAX_RETRIES", env_var("SYNCLOOP_MAX_RETRIES")?)?;

    let rate_limiter = RateLimiterConfig::Controller {
        base_delay_ms: env_or("SYNCLOOP_BASE_DELAY_MS", DEFAULT_BASE_DELAY_MS)?,
        max_delay_ms: env_or("SYNCLOOP_MAX_DELAY_MS", DEFAULT_MAX_DELAY_MS)?,
        qps: env_or("SYNCLOOP_QPS", DEFAULT_BUCKET_QPS)?,
        burst: env_or("SYNCLOOP_BURST", DEFAULT_BUCKET_BURST)?,
    };
    let join_timeout_ms = env_or("SYNCLOOP_JOIN_TIMEOUT_MS", DEFAULT_JOIN_TIMEOUT_MS)?;
    let log_format = env_or("SYNCLOOP_LOG_FORMAT", LogFormat::default())?;

    let config = ControllerConfig { workers, max_retries, rate_limiter, join_timeout_ms, log_format };
    validate(&config)?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes the standard locations. Format is chosen by
/// extension.
///
/// # Errors
/// Returns `DomainError::Config` if the file is missing, unreadable,
/// malformed, or fails validation.
pub fn load_from_file(path: Option<PathBuf>) -> Result<ControllerConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(DomainError::Config(format!("Config file not found: {}", p.display())));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            DomainError::Config("No config file found in any of the standard locations".to_string())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| DomainError::Config(format!("Failed to read config file: {e}")))?;

    let config = parse_config(&contents, &config_path)?;
    validate(&config)?;
    Ok(config)
}

/// Check the worker settings, then build the limiter once to check its
/// parameters
fn validate(config: &ControllerConfig) -> Result<()> {
    config.validate()?;
    match build_rate_limiter(&config.rate_limiter) {
        Ok(_) => Ok(()),
        Err(ControllerError::Common(CommonError::Config { message, .. })) => {
            Err(DomainError::Config(message))
        }
        Err(e) => Err(DomainError::Config(e.to_string())),
    }
}

fn parse_config(contents: &str, path: &Path) -> Result<ControllerConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| DomainError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| DomainError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(DomainError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// First existing config file in the standard locations
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut dirs = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        dirs.push(cwd);
    }
    if let Some(exe_dir) = std::env::current_exe().ok().and_then(|p| p.parent().map(Path::to_path_buf)) {
        dirs.push(exe_dir);
    }

    probe_in(&dirs)
}

fn probe_in(dirs: &[PathBuf]) -> Option<PathBuf> {
    dirs.iter()
        .flat_map(|dir| CONFIG_FILE_NAMES.iter().map(move |name| dir.join(name)))
        .find(|path| path.is_file())
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key)
        .map_err(|_| DomainError::Config(format!("Missing required environment variable: {key}")))
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => parse_env(key, raw),
        Err(_) => Ok(default),
    }
}

fn parse_env<T>(key: &str, raw: String) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e| DomainError::Config(format!("Invalid value for {key}: {e}")))
}
