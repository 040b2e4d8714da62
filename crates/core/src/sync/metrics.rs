use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use serde::{Deserialize, Serialize};

/// Worker-loop counters
///
/// Created by whoever builds the worker loop and shared through `Arc`;
/// several controllers in one process keep separate counters.
#[derive(Debug, Default)]
pub struct WorkerMetrics {
    pub syncs: AtomicU64,
    pub successes: AtomicU64,
    pub absent: AtomicU64,
    pub failures: AtomicU64,
    pub requeues: AtomicU64,
    pub drops: AtomicU64,
    pub panics: AtomicU64,
}

impl WorkerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_sync(&self) {
        self.syncs.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub fn record_success(&self) {
        self.successes.fetch_add(1, AtomicOrdering::Relaxed);
    }

    /// The key resolved to an object that is no longer cached
    pub fn record_absent(&self) {
        self.absent.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failures.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub fn record_requeue(&self) {
        self.requeues.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub fn record_drop(&self) {
        self.drops.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub fn record_panic(&self) {
        self.panics.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub fn snapshot(&self) -> WorkerMetricsSnapshot {
        WorkerMetricsSnapshot {
            syncs: self.syncs.load(AtomicOrdering::Relaxed),
            successes: self.successes.load(AtomicOrdering::Relaxed),
            absent: self.absent.load(AtomicOrdering::Relaxed),
            failures: self.failures.load(AtomicOrdering::Relaxed),
            requeues: self.requeues.load(AtomicOrdering::Relaxed),
            drops: self.drops.load(AtomicOrdering::Relaxed),
            panics: self.panics.load(AtomicOrdering::Relaxed),
        }
    }
}

/// Immutable metrics snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerMetricsSnapshot {
    pub syncs: u64,
    pub successes: u64,
    pub absent: u64,
    pub failures: u64,
    pub requeues: u64,
    pub drops: u64,
    pub panics: u64,
}
