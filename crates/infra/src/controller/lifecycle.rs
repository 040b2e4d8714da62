use std::sync::Arc;
use std::time::Duration;

use syncloop_common::sync::{QueueMetrics, QueueMetricsSnapshot, RateLimitedQueue, RateLimiter};
use syncloop_core::{
    Handler, Indexer, RetryPolicy, SyncContext, Syncer, WorkQueue, WorkerLoop, WorkerMetrics,
    WorkerMetricsSnapshot,
};
use syncloop_domain::{ControllerConfig, ObjectKey};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::rate_limiter::build_rate_limiter;
use crate::errors::{ControllerError, ControllerResult};

/// Reconciliation controller with explicit lifecycle management
///
/// Keys can be enqueued before [`start`](Self::start); they are processed
/// once workers are running. [`stop`](Self::stop) discards keys that are
/// still queued or parked for a delayed requeue, and a later `start` begins
/// with an empty queue and fresh requeue counts. Backoff history in the
/// limiter survives restarts.
pub struct Controller {
    config: ControllerConfig,
    syncer: Syncer,
    policy: RetryPolicy,
    limiter: Arc<dyn RateLimiter<ObjectKey>>,
    queue_metrics: Arc<QueueMetrics>,
    metrics: Arc<WorkerMetrics>,
    queue: RateLimitedQueue<ObjectKey>,
    cancellation: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl Controller {
    /// Create a controller after validating `config`
    pub fn new(
        indexer: Arc<dyn Indexer>,
        handler: Arc<dyn Handler>,
        config: ControllerConfig,
        metrics: Arc<WorkerMetrics>,
    ) -> ControllerResult<Self> {
        config.validate()?;
        let limiter = build_rate_limiter(&config.rate_limiter)?;
        let queue_metrics = Arc::new(QueueMetrics::new());
        let queue = RateLimitedQueue::from_shared(Arc::clone(&limiter), Arc::clone(&queue_metrics));

        Ok(Self {
            syncer: Syncer::new(indexer, handler),
            policy: RetryPolicy::new(config.max_retries),
            config,
            limiter,
            queue_metrics,
            metrics,
            queue,
            cancellation: CancellationToken::new(),
            handles: Vec::new(),
        })
    }

    /// Spawn `config.workers` worker tasks
    #[instrument(skip(self), fields(workers = self.config.workers))]
    pub async fn start(&mut self) -> ControllerResult<()> {
        if self.is_running() {
            return Err(ControllerError::AlreadyRunning);
        }

        info!("Starting controller");

        if self.queue.shutting_down() {
            self.queue = RateLimitedQueue::from_shared(
                Arc::clone(&self.limiter),
                Arc::clone(&self.queue_metrics),
            );
        }
        self.cancellation = CancellationToken::new();

        let queue: Arc<dyn WorkQueue> = Arc::new(self.queue.clone());
        let worker = WorkerLoop::new(
            queue,
            self.syncer.clone(),
            self.policy,
            Arc::clone(&self.metrics),
        );

        for worker_id in 0..self.config.workers {
            let worker = worker.clone();
            let ctx = SyncContext::new(self.cancellation.child_token(), worker_id);
            self.handles.push(tokio::spawn(async move { worker.run(ctx).await }));
        }

        info!("Controller started");
        Ok(())
    }

    /// Stop all workers and wait for them to finish
    ///
    /// Cancels the handler context, shuts the queue down, then waits up to
    /// `join_timeout` for each worker. Workers that miss the deadline are
    /// aborted and the first failure is returned after every worker has been
    /// dealt with.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> ControllerResult<()> {
        if !self.is_running() {
            return Err(ControllerError::NotRunning);
        }

        info!("Stopping controller");

        self.cancellation.cancel();
        self.queue.shut_down();

        let join_timeout = self.config.join_timeout();
        let mut first_error = None;
        for (worker, mut handle) in self.handles.drain(..).enumerate() {
            let outcome = match tokio::time::timeout(join_timeout, &mut handle).await {
                Ok(Ok(())) => {
                    debug!(worker, "Worker joined");
                    Ok(())
                }
                Ok(Err(e)) => {
                    warn!(worker, error = %e, "Worker task failed");
                    Err(ControllerError::WorkerFailed { worker, message: e.to_string() })
                }
                Err(_) => {
                    warn!(worker, timeout_ms = join_timeout.as_millis() as u64, "Worker did not stop in time; aborting");
                    handle.abort();
                    Err(ControllerError::JoinTimeout { worker, timeout: join_timeout })
                }
            };
            if let Err(e) = outcome {
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => {
                info!("Controller stopped");
                Ok(())
            }
        }
    }

    /// Queue a key for reconciliation
    ///
    /// Ignored while the controller is stopping.
    pub fn enqueue(&self, key: ObjectKey) {
        self.queue.add(key);
    }

    /// Queue a key after `delay`
    pub fn enqueue_after(&self, key: ObjectKey, delay: Duration) {
        self.queue.add_after(key, delay);
    }

    pub fn is_running(&self) -> bool {
        !self.handles.is_empty()
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Keys waiting to be handed to a worker
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn metrics(&self) -> WorkerMetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn queue_metrics(&self) -> QueueMetricsSnapshot {
        self.queue_metrics.snapshot()
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        if self.is_running() {
            warn!("Controller dropped while running; cancelling workers");
            self.cancellation.cancel();
            self.queue.shut_down();
        }
    }
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("config", &self.config)
            .field("running", &self.is_running())
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}
