//! # Syncloop Domain
//!
//! Domain types shared by the reconciliation work-loop.
//!
//! This crate contains:
//! - Object keys, unstructured objects and the events handed to handlers
//! - Domain error types and Result definitions
//! - Controller configuration structures
//! - Domain constants
//!
//! ## Architecture
//! - No dependencies on other Syncloop crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
