//! # Syncloop Infrastructure
//!
//! Runtime wiring for the reconciliation work-loop.
//!
//! This crate contains:
//! - An in-memory object cache implementing the core `Indexer` port
//! - The `Controller`, which owns the queue and spawns worker tasks
//! - Configuration loading from environment variables or files
//! - Logging initialisation
//!
//! ## Architecture
//! - Implements traits defined in `syncloop-core`
//! - Contains all "impure" code (task spawning, file and env I/O)

pub mod cache;
pub mod config;
pub mod controller;
pub mod errors;
pub mod observability;

// Re-export commonly used items
pub use cache::MemoryIndexer;
pub use controller::{build_rate_limiter, Controller};
pub use errors::{ControllerError, ControllerResult};
pub use observability::init_logging;
