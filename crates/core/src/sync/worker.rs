//! The worker loop
//!
//! Each worker repeats: take a key, sync it, apply the retry policy, release
//! the key. Per-key exclusion comes from the queue alone, so any number of
//! workers can share one queue.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use syncloop_domain::ObjectKey;
use tracing::{debug, error, info, instrument};

use super::context::SyncContext;
use super::errors::SyncError;
use super::metrics::WorkerMetrics;
use super::ports::WorkQueue;
use super::retry_policy::{RetryPolicy, SyncOutcome};
use super::syncer::{SyncStatus, Syncer};

/// Calls `done` for the key when dropped, so the in-flight slot is released
/// on every exit path
struct DoneGuard<'a> {
    queue: &'a dyn WorkQueue,
    key: ObjectKey,
}

impl Drop for DoneGuard<'_> {
    fn drop(&mut self) {
        self.queue.done(&self.key);
    }
}

/// Process one key
///
/// Returns `false` once the queue has shut down and the worker should exit.
/// A panic inside the sync is contained and handled as a failed sync.
pub async fn process_next_item(
    queue: &dyn WorkQueue,
    syncer: &Syncer,
    policy: &RetryPolicy,
    metrics: &WorkerMetrics,
    ctx: &SyncContext,
) -> bool {
    let Some(key) = queue.get().await else {
        return false;
    };
    let guard = DoneGuard { queue, key };
    let key = &guard.key;

    metrics.record_sync();
    let result = match AssertUnwindSafe(syncer.sync(ctx, key)).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => {
            metrics.record_panic();
            let message = panic_message(payload.as_ref());
            error!(key = %key, panic = %message, "Sync panicked");
            Err(SyncError::Panicked(message))
        }
    };

    match &result {
        Ok(SyncStatus::Reconciled) => metrics.record_success(),
        Ok(SyncStatus::Absent) => metrics.record_absent(),
        Err(_) => metrics.record_failure(),
    }

    match policy.handle_result(queue, key, &result) {
        SyncOutcome::Clean => debug!(key = %key, "Synced"),
        SyncOutcome::Requeued { .. } => metrics.record_requeue(),
        SyncOutcome::Dropped { .. } => metrics.record_drop(),
    }

    drop(guard);
    true
}

/// Run until the queue shuts down
pub async fn run_worker(
    queue: &dyn WorkQueue,
    syncer: &Syncer,
    policy: &RetryPolicy,
    metrics: &WorkerMetrics,
    ctx: &SyncContext,
) {
    while process_next_item(queue, syncer, policy, metrics, ctx).await {}
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Owned bundle of everything a worker needs, cheap to clone into tasks
#[derive(Clone)]
pub struct WorkerLoop {
    queue: Arc<dyn WorkQueue>,
    syncer: Syncer,
    policy: RetryPolicy,
    metrics: Arc<WorkerMetrics>,
}

impl WorkerLoop {
    pub fn new(
        queue: Arc<dyn WorkQueue>,
        syncer: Syncer,
        policy: RetryPolicy,
        metrics: Arc<WorkerMetrics>,
    ) -> Self {
        Self { queue, syncer, policy, metrics }
    }

    pub async fn process_next_item(&self, ctx: &SyncContext) -> bool {
        process_next_item(self.queue.as_ref(), &self.syncer, &self.policy, &self.metrics, ctx).await
    }

    /// Run one worker until the queue shuts down
    #[instrument(skip_all, fields(worker = ctx.worker_id))]
    pub async fn run(&self, ctx: SyncContext) {
        info!("Worker started");
        run_worker(self.queue.as_ref(), &self.syncer, &self.policy, &self.metrics, &ctx).await;
        info!("Worker stopped");
    }

    pub fn metrics(&self) -> &Arc<WorkerMetrics> {
        &self.metrics
    }
}

impl std::fmt::Debug for WorkerLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerLoop").field("policy", &self.policy).finish_non_exhaustive()
    }
}
