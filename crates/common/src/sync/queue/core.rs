use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::{debug, info, trace};

use super::metrics::{QueueMetrics, QueueMetricsSnapshot};

/// Bounds every queued key must satisfy
pub trait QueueKey: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static {}

impl<T> QueueKey for T where T: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static {}

/// Internal bookkeeping guarded by a single mutex
///
/// - `queue`: keys ready to be handed out, in FIFO order
/// - `dirty`: keys that need processing (superset of `queue`)
/// - `processing`: keys currently held by a worker
///
/// A key is in `queue` only if it is dirty and not processing, so at most one
/// pending or in-flight instance of any key exists.
#[derive(Debug)]
struct QueueState<K> {
    queue: VecDeque<K>,
    dirty: HashSet<K>,
    processing: HashSet<K>,
    shutting_down: bool,
    drain: bool,
}

impl<K> Default for QueueState<K> {
    fn default() -> Self {
        Self {
            queue: VecDeque::new(),
            dirty: HashSet::new(),
            processing: HashSet::new(),
            shutting_down: false,
            drain: false,
        }
    }
}

/// Deduplicating FIFO work queue with per-key in-flight exclusion
///
/// ## Semantics
///
/// - Adding a key that is already pending is a no-op.
/// - Adding a key that is being processed marks it dirty; it is re-queued
///   when the worker calls [`done`](Self::done), never handed out twice at
///   the same time.
/// - After [`shut_down`](Self::shut_down) new adds are ignored, already
///   queued keys are still handed out, and [`get`](Self::get) returns `None`
///   once the queue is empty.
///
/// State lives behind a `parking_lot::Mutex`, which does not poison: a worker
/// that panics while holding a key cannot wedge the queue for other keys.
///
/// Cloning is cheap and every clone refers to the same queue.
pub struct WorkQueue<K: QueueKey> {
    state: Arc<Mutex<QueueState<K>>>,
    notify: Arc<Notify>,
    drained: Arc<Notify>,
    metrics: Arc<QueueMetrics>,
}

impl<K: QueueKey> WorkQueue<K> {
    /// Create an empty queue with its own metrics
    pub fn new() -> Self {
        Self::with_metrics(Arc::new(QueueMetrics::new()))
    }

    /// Create an empty queue reporting into the given metrics
    pub fn with_metrics(metrics: Arc<QueueMetrics>) -> Self {
        Self {
            state: Arc::new(Mutex::new(QueueState::default())),
            notify: Arc::new(Notify::new()),
            drained: Arc::new(Notify::new()),
            metrics,
        }
    }

    /// Mark `key` as needing processing
    pub fn add(&self, key: K) {
        let mut state = self.state.lock();

        if state.shutting_down {
            trace!(key = ?key, "Ignoring add on shut down queue");
            return;
        }

        if state.dirty.contains(&key) {
            self.metrics.record_deduplication();
            return;
        }

        self.metrics.record_add();
        state.dirty.insert(key.clone());

        if state.processing.contains(&key) {
            debug!(key = ?key, "Key in flight, marked dirty for redelivery");
            return;
        }

        state.queue.push_back(key);
        self.metrics.update_depth(state.queue.len());
        drop(state);

        self.notify.notify_one();
    }

    /// Wait for the next key
    ///
    /// Returns `None` only once the queue is shutting down and no queued keys
    /// remain. The caller owns the returned key until it calls
    /// [`done`](Self::done).
    pub async fn get(&self) -> Option<K> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.state.lock();
                if let Some(key) = state.queue.pop_front() {
                    state.dirty.remove(&key);
                    state.processing.insert(key.clone());
                    self.metrics.record_dequeue();
                    self.metrics.update_depth(state.queue.len());
                    return Some(key);
                }
                if state.shutting_down {
                    return None;
                }
            }

            notified.await;
        }
    }

    /// Release `key` after processing
    ///
    /// If the key was re-added while in flight it goes back to the queue.
    pub fn done(&self, key: &K) {
        let mut state = self.state.lock();

        if !state.processing.remove(key) {
            trace!(key = ?key, "done called for key that is not in flight");
            return;
        }
        self.metrics.record_completion();

        let requeued = state.dirty.contains(key);
        if requeued {
            state.queue.push_back(key.clone());
            self.metrics.record_redelivery();
            self.metrics.update_depth(state.queue.len());
        }

        let drained = state.drain && state.processing.is_empty();
        drop(state);

        if requeued {
            self.notify.notify_one();
        }
        if drained {
            self.drained.notify_waiters();
        }
    }

    /// Stop accepting new keys and wake every waiting worker
    pub fn shut_down(&self) {
        {
            let mut state = self.state.lock();
            if state.shutting_down {
                return;
            }
            state.shutting_down = true;
        }
        info!("Work queue shutting down");
        self.notify.notify_waiters();
    }

    /// Shut down and wait until every in-flight key has been released
    pub async fn shut_down_with_drain(&self) {
        self.state.lock().drain = true;
        self.shut_down();

        loop {
            let drained = self.drained.notified();
            tokio::pin!(drained);
            drained.as_mut().enable();

            if self.state.lock().processing.is_empty() {
                break;
            }
            drained.await;
        }

        self.state.lock().drain = false;
        info!("Work queue drained");
    }

    /// Whether shutdown has been requested
    pub fn shutting_down(&self) -> bool {
        self.state.lock().shutting_down
    }

    /// Number of keys waiting to be handed out (in-flight keys excluded)
    pub fn len(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Whether no keys are waiting
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of keys currently held by workers
    pub fn in_flight(&self) -> usize {
        self.state.lock().processing.len()
    }

    /// Whether `key` is currently held by a worker
    pub fn is_processing(&self, key: &K) -> bool {
        self.state.lock().processing.contains(key)
    }

    /// Shared metrics handle
    pub fn metrics_handle(&self) -> Arc<QueueMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Get queue metrics
    pub fn metrics(&self) -> QueueMetricsSnapshot {
        self.metrics.snapshot()
    }
}

impl<K: QueueKey> Clone for WorkQueue<K> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            notify: Arc::clone(&self.notify),
            drained: Arc::clone(&self.drained),
            metrics: Arc::clone(&self.metrics),
        }
    }
}

impl<K: QueueKey> Default for WorkQueue<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: QueueKey> fmt::Debug for WorkQueue<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("WorkQueue")
            .field("queued", &state.queue.len())
            .field("processing", &state.processing.len())
            .field("shutting_down", &state.shutting_down)
            .finish()
    }
}
