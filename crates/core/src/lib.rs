//! # Syncloop Core
//!
//! Reconciliation logic - no infrastructure dependencies.
//!
//! This crate contains:
//! - Port interfaces (traits) for the cache, the handler and the work queue
//! - The sync step, the retry policy and the worker loop
//!
//! ## Architecture Principles
//! - Only depends on `syncloop-common` and `syncloop-domain`
//! - No runtime wiring: spawning workers and loading config live in infra
//! - All external collaborators via traits
//! - Pure, testable logic

pub mod sync;

pub use sync::context::SyncContext;
pub use sync::errors::SyncError;
pub use sync::metrics::{WorkerMetrics, WorkerMetricsSnapshot};
pub use sync::ports::{Handler, Indexer, WorkQueue};
pub use sync::retry_policy::{RetryPolicy, SyncOutcome};
pub use sync::syncer::{SyncStatus, Syncer};
pub use sync::worker::{process_next_item, run_worker, WorkerLoop};
