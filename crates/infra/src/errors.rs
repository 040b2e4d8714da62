//! Controller lifecycle errors

use std::time::Duration;

use syncloop_common::error::{CommonError, ErrorSeverity};
use syncloop_common::{impl_error_classification, impl_error_conversion};
use syncloop_domain::DomainError;
use thiserror::Error;

/// Errors raised while building, starting or stopping a controller
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("controller already running")]
    AlreadyRunning,

    #[error("controller not running")]
    NotRunning,

    /// The configuration failed validation
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// A worker did not finish within the join timeout
    #[error("worker {worker} did not stop within {timeout:?}")]
    JoinTimeout { worker: usize, timeout: Duration },

    /// A worker task panicked outside the contained sync
    #[error("worker {worker} failed: {message}")]
    WorkerFailed { worker: usize, message: String },

    #[error(transparent)]
    Common(#[from] CommonError),
}

impl_error_conversion!(ControllerError, Common);
impl_error_classification!(ControllerError, Common,
    Self::AlreadyRunning | Self::NotRunning => {
        retryable: false,
        severity: ErrorSeverity::Warning,
        critical: false,
    },
    Self::Domain(_) => {
        retryable: false,
        severity: ErrorSeverity::Error,
        critical: false,
    },
    Self::JoinTimeout { .. } => {
        retryable: true,
        severity: ErrorSeverity::Warning,
        critical: false,
    },
    Self::WorkerFailed { .. } => {
        retryable: false,
        severity: ErrorSeverity::Critical,
        critical: true,
    }
);

pub type ControllerResult<T> = Result<T, ControllerError>;
