//! Error types used throughout the work-loop

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for domain operations and handler results
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum DomainError {
    #[error("Invalid object key: {0}")]
    InvalidKey(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Handler error: {0}")]
    Handler(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DomainError {
    /// Shorthand used by handlers to report a failed reconciliation
    pub fn handler(message: impl Into<String>) -> Self {
        Self::Handler(message.into())
    }
}

/// Result type alias for domain operations
pub type Result<T> = std::result::Result<T, DomainError>;
