use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, trace};

use super::core::QueueKey;
use super::delaying::DelayingQueue;
use super::metrics::{QueueMetrics, QueueMetricsSnapshot};
use crate::sync::retry::RateLimiter;

/// Delaying queue whose re-enqueue delay is chosen by a [`RateLimiter`]
///
/// This is the queue a reconciliation worker talks to: it takes keys with
/// `get`, releases them with `done`, and on failure hands them back through
/// [`add_rate_limited`](Self::add_rate_limited). A successful sync calls
/// [`forget`](Self::forget) so the next failure starts from the base delay.
///
/// The queue keeps its own per-key requeue count. Limiters without per-key
/// history (an overall token bucket) still bound the number of retries.
pub struct RateLimitedQueue<K: QueueKey> {
    queue: DelayingQueue<K>,
    limiter: Arc<dyn RateLimiter<K>>,
    requeues: Arc<Mutex<HashMap<K, u32>>>,
}

impl<K: QueueKey> RateLimitedQueue<K> {
    pub fn new<L>(limiter: L) -> Self
    where
        L: RateLimiter<K> + 'static,
    {
        Self::with_metrics(limiter, Arc::new(QueueMetrics::new()))
    }

    pub fn with_metrics<L>(limiter: L, metrics: Arc<QueueMetrics>) -> Self
    where
        L: RateLimiter<K> + 'static,
    {
        Self::from_shared(Arc::new(limiter), metrics)
    }

    /// Build from an already shared (possibly type-erased) limiter
    pub fn from_shared(limiter: Arc<dyn RateLimiter<K>>, metrics: Arc<QueueMetrics>) -> Self {
        Self {
            queue: DelayingQueue::with_metrics(metrics),
            limiter,
            requeues: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Re-enqueue `key` after the delay the limiter chooses for it
    ///
    /// Consults the limiter exactly once, so each call counts as one requeue.
    /// Ignored once the queue is shutting down; neither the limiter nor the
    /// requeue count sees the key.
    pub fn add_rate_limited(&self, key: K) {
        if self.queue.shutting_down() {
            trace!(key = ?key, "Queue shutting down, not requeueing");
            return;
        }

        {
            let mut requeues = self.requeues.lock();
            let count = requeues.entry(key.clone()).or_insert(0);
            *count = count.saturating_add(1);
        }
        let delay = self.limiter.when(&key);
        debug!(key = ?key, delay_ms = delay.as_millis() as u64, "Requeueing with backoff");
        self.queue.metrics_handle().record_rate_limited();
        self.queue.add_after(key, delay);
    }

    /// Clear the requeue count and the limiter's history for `key`
    ///
    /// Does not remove the key from the queue.
    pub fn forget(&self, key: &K) {
        self.requeues.lock().remove(key);
        self.limiter.forget(key);
        self.queue.metrics_handle().record_forget();
    }

    /// How many times `key` has been requeued since it was last forgotten
    pub fn num_requeues(&self, key: &K) -> u32 {
        self.requeues.lock().get(key).copied().unwrap_or(0)
    }

    pub fn add(&self, key: K) {
        self.queue.add(key);
    }

    pub fn add_after(&self, key: K, delay: Duration) {
        self.queue.add_after(key, delay);
    }

    pub async fn get(&self) -> Option<K> {
        self.queue.get().await
    }

    pub fn done(&self, key: &K) {
        self.queue.done(key);
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn waiting_len(&self) -> usize {
        self.queue.waiting_len()
    }

    pub fn poll_waiting(&self) -> usize {
        self.queue.poll_waiting()
    }

    pub fn shutting_down(&self) -> bool {
        self.queue.shutting_down()
    }

    pub fn shut_down(&self) {
        self.queue.shut_down();
    }

    pub async fn shut_down_with_drain(&self) {
        self.queue.shut_down_with_drain().await;
    }

    pub fn metrics(&self) -> QueueMetricsSnapshot {
        self.queue.metrics()
    }
}

impl<K: QueueKey> Clone for RateLimitedQueue<K> {
    fn clone(&self) -> Self {
        Self {
            queue: self.queue.clone(),
            limiter: Arc::clone(&self.limiter),
            requeues: Arc::clone(&self.requeues),
        }
    }
}

impl<K: QueueKey> fmt::Debug for RateLimitedQueue<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimitedQueue")
            .field("queue", &self.queue)
            .field("tracked_keys", &self.requeues.lock().len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::Instant;

    use super::*;
    use crate::sync::retry::{Bucket, ItemExponentialFailure};

    fn queue() -> RateLimitedQueue<&'static str> {
        let limiter =
            ItemExponentialFailure::new(Duration::from_millis(10), Duration::from_secs(1)).unwrap();
        RateLimitedQueue::new(limiter)
    }

    #[tokio::test(start_paused = true)]
    async fn add_rate_limited_backs_off_and_counts_requeues() {
        let queue = queue();

        queue.add_rate_limited("ns/a");
        assert_eq!(queue.num_requeues(&"ns/a"), 1);
        let start = Instant::now();
        assert_eq!(queue.get().await, Some("ns/a"));
        assert!(start.elapsed() >= Duration::from_millis(10));
        queue.done(&"ns/a");

        queue.add_rate_limited("ns/a");
        assert_eq!(queue.num_requeues(&"ns/a"), 2);
        let start = Instant::now();
        assert_eq!(queue.get().await, Some("ns/a"));
        assert!(start.elapsed() >= Duration::from_millis(20));
        queue.done(&"ns/a");

        let metrics = queue.metrics();
        assert_eq!(metrics.total_rate_limited, 2);
        assert_eq!(metrics.total_delayed, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn forget_resets_history_but_keeps_queued_key() {
        let queue = queue();
        queue.add_rate_limited("ns/a");
        queue.add_rate_limited("ns/a");
        queue.forget(&"ns/a");

        assert_eq!(queue.num_requeues(&"ns/a"), 0);
        assert_eq!(queue.waiting_len(), 1);
        assert_eq!(queue.get().await, Some("ns/a"));
        assert_eq!(queue.metrics().total_forgotten, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn requeues_are_counted_for_limiters_without_key_history() {
        let queue = RateLimitedQueue::new(Bucket::new(1000.0, 1000).unwrap());

        for expected in 1..=3 {
            queue.add_rate_limited("ns/a");
            assert_eq!(queue.num_requeues(&"ns/a"), expected);
            assert_eq!(queue.get().await, Some("ns/a"));
            queue.done(&"ns/a");
        }
        assert_eq!(queue.num_requeues(&"ns/b"), 0);

        queue.forget(&"ns/a");
        assert_eq!(queue.num_requeues(&"ns/a"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn add_rate_limited_after_shutdown_leaves_history_untouched() {
        let limiter: Arc<dyn RateLimiter<&'static str>> = Arc::new(
            ItemExponentialFailure::new(Duration::from_millis(10), Duration::from_secs(1)).unwrap(),
        );
        let queue = RateLimitedQueue::from_shared(Arc::clone(&limiter), Arc::new(QueueMetrics::new()));

        queue.shut_down();
        queue.add_rate_limited("ns/a");

        assert_eq!(queue.num_requeues(&"ns/a"), 0);
        assert_eq!(limiter.num_requeues(&"ns/a"), 0);
        assert_eq!(queue.waiting_len(), 0);
        assert_eq!(queue.metrics().total_rate_limited, 0);
    }
}
