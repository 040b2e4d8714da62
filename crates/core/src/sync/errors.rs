//! Error types for a single sync

use syncloop_common::error::{ErrorClassification, ErrorSeverity};
use syncloop_domain::DomainError;
use thiserror::Error;

/// Why a sync of one key failed
///
/// The retry policy treats every variant the same way; the distinction is
/// kept for logs and metrics.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The cache lookup failed (distinct from the object being absent)
    #[error("cache lookup failed: {0}")]
    Indexer(#[source] DomainError),

    #[error("handler failed: {0}")]
    Handler(#[source] DomainError),

    /// The sync panicked; the panic was contained
    #[error("sync panicked: {0}")]
    Panicked(String),
}

impl ErrorClassification for SyncError {
    fn is_retryable(&self) -> bool {
        true
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Indexer(_) | Self::Handler(_) => ErrorSeverity::Error,
            Self::Panicked(_) => ErrorSeverity::Critical,
        }
    }

    fn is_critical(&self) -> bool {
        matches!(self, Self::Panicked(_))
    }

    fn retry_after(&self) -> Option<std::time::Duration> {
        None
    }
}
