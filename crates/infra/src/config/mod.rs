//! Configuration loading
//!
//! Builds a validated [`ControllerConfig`](syncloop_domain::ControllerConfig)
//! from environment variables or a TOML/JSON file.

pub mod loader;

// Re-export commonly used items
pub use loader::{load, load_from_env, load_from_file, probe_config_paths};
