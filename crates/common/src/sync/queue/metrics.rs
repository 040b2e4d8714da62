use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering as AtomicOrdering};

use serde::{Deserialize, Serialize};

/// Work queue counters
///
/// Owned by a queue instance and shared through `Arc`; nothing here is
/// process-global.
#[derive(Debug, Default)]
pub struct QueueMetrics {
    pub total_added: AtomicU64,
    pub deduplication_hits: AtomicU64,
    pub total_dequeued: AtomicU64,
    pub total_completed: AtomicU64,
    pub total_redelivered: AtomicU64,
    pub total_delayed: AtomicU64,
    pub total_rate_limited: AtomicU64,
    pub total_forgotten: AtomicU64,
    pub current_depth: AtomicUsize,
    pub queue_depth_max: AtomicUsize,
}

impl QueueMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a key entering the pending queue
    pub fn record_add(&self) {
        self.total_added.fetch_add(1, AtomicOrdering::Relaxed);
    }

    /// Record an add that collapsed into an existing dirty key
    pub fn record_deduplication(&self) {
        self.deduplication_hits.fetch_add(1, AtomicOrdering::Relaxed);
    }

    /// Record a key handed to a worker
    pub fn record_dequeue(&self) {
        self.total_dequeued.fetch_add(1, AtomicOrdering::Relaxed);
    }

    /// Record a worker releasing a key
    pub fn record_completion(&self) {
        self.total_completed.fetch_add(1, AtomicOrdering::Relaxed);
    }

    /// Record a dirty key re-queued after its in-flight instance finished
    pub fn record_redelivery(&self) {
        self.total_redelivered.fetch_add(1, AtomicOrdering::Relaxed);
    }

    /// Record a key parked in the waiting set
    pub fn record_delayed(&self) {
        self.total_delayed.fetch_add(1, AtomicOrdering::Relaxed);
    }

    /// Record a rate-limited re-enqueue
    pub fn record_rate_limited(&self) {
        self.total_rate_limited.fetch_add(1, AtomicOrdering::Relaxed);
    }

    /// Record a reset of a key's retry history
    pub fn record_forget(&self) {
        self.total_forgotten.fetch_add(1, AtomicOrdering::Relaxed);
    }

    /// Update current depth (pending keys, excluding in-flight ones)
    pub fn update_depth(&self, depth: usize) {
        self.current_depth.store(depth, AtomicOrdering::Relaxed);
        self.queue_depth_max.fetch_max(depth, AtomicOrdering::Relaxed);
    }

    /// Get a snapshot of metrics
    pub fn snapshot(&self) -> QueueMetricsSnapshot {
        QueueMetricsSnapshot {
            total_added: self.total_added.load(AtomicOrdering::Relaxed),
            deduplication_hits: self.deduplication_hits.load(AtomicOrdering::Relaxed),
            total_dequeued: self.total_dequeued.load(AtomicOrdering::Relaxed),
            total_completed: self.total_completed.load(AtomicOrdering::Relaxed),
            total_redelivered: self.total_redelivered.load(AtomicOrdering::Relaxed),
            total_delayed: self.total_delayed.load(AtomicOrdering::Relaxed),
            total_rate_limited: self.total_rate_limited.load(AtomicOrdering::Relaxed),
            total_forgotten: self.total_forgotten.load(AtomicOrdering::Relaxed),
            current_depth: self.current_depth.load(AtomicOrdering::Relaxed),
            queue_depth_max: self.queue_depth_max.load(AtomicOrdering::Relaxed),
        }
    }
}

/// Immutable metrics snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueMetricsSnapshot {
    pub total_added: u64,
    pub deduplication_hits: u64,
    pub total_dequeued: u64,
    pub total_completed: u64,
    pub total_redelivered: u64,
    pub total_delayed: u64,
    pub total_rate_limited: u64,
    pub total_forgotten: u64,
    pub current_depth: usize,
    pub queue_depth_max: usize,
}

impl QueueMetricsSnapshot {
    /// Keys currently held by workers
    pub fn in_flight(&self) -> u64 {
        self.total_dequeued.saturating_sub(self.total_completed)
    }

    /// Get a human-readable summary
    pub fn summary(&self) -> String {
        format!(
            "Queue Metrics:\n\
            - Depth: {} (max {})\n\
            - Added: {} (deduplicated: {})\n\
            - Dequeued: {} / Completed: {}\n\
            - Redelivered: {}\n\
            - Rate limited: {} / Forgotten: {}",
            self.current_depth,
            self.queue_depth_max,
            self.total_added,
            self.deduplication_hits,
            self.total_dequeued,
            self.total_completed,
            self.total_redelivered,
            self.total_rate_limited,
            self.total_forgotten
        )
    }
}
