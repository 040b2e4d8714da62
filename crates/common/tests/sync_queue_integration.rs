//! Integration tests for the work queue
//!
//! Covers deduplication, in-flight exclusion under concurrent workers,
//! delayed delivery and shutdown semantics with metrics tracking.

#![cfg(feature = "runtime")]

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use syncloop_common::sync::{
    DelayingQueue, ItemExponentialFailure, QueueMetrics, RateLimitedQueue, WorkQueue,
};
use syncloop_common::testing::poll_until;

/// Validates that repeated adds of pending keys collapse and metrics reflect
/// the add/get/done cycle.
#[tokio::test(flavor = "multi_thread")]
async fn test_queue_deduplication_and_metrics() {
    let queue = WorkQueue::new();

    for _ in 0..5 {
        queue.add("default/web".to_string());
    }
    queue.add("default/db".to_string());

    let mut seen = Vec::new();
    while !queue.is_empty() {
        let key = queue.get().await.expect("queue is not shut down");
        queue.done(&key);
        seen.push(key);
    }

    assert_eq!(seen, vec!["default/web".to_string(), "default/db".to_string()]);

    let metrics = queue.metrics();
    assert_eq!(metrics.total_added, 2);
    assert_eq!(metrics.deduplication_hits, 4);
    assert_eq!(metrics.total_dequeued, 2);
    assert_eq!(metrics.total_completed, 2);
    assert_eq!(metrics.current_depth, 0);
    assert_eq!(metrics.queue_depth_max, 2);
    assert_eq!(metrics.in_flight(), 0);
}

/// Hammers one key from several producers while several workers consume it;
/// no two workers may ever hold the key at the same time.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_key_is_never_processed_concurrently() {
    let queue: WorkQueue<String> = WorkQueue::new();
    let holding = Arc::new(Mutex::new(HashSet::new()));
    let overlaps = Arc::new(AtomicUsize::new(0));
    let processed = Arc::new(AtomicUsize::new(0));

    let workers: Vec<_> = (0..4)
        .map(|_| {
            let queue = queue.clone();
            let holding = Arc::clone(&holding);
            let overlaps = Arc::clone(&overlaps);
            let processed = Arc::clone(&processed);
            tokio::spawn(async move {
                while let Some(key) = queue.get().await {
                    if !holding.lock().insert(key.clone()) {
                        overlaps.fetch_add(1, Ordering::SeqCst);
                    }
                    tokio::time::sleep(Duration::from_millis(1)).await;
                    holding.lock().remove(&key);
                    processed.fetch_add(1, Ordering::SeqCst);
                    queue.done(&key);
                }
            })
        })
        .collect();

    for round in 0..200 {
        queue.add(format!("default/obj-{}", round % 3));
        if round % 20 == 0 {
            tokio::task::yield_now().await;
        }
    }

    let drained = poll_until(Duration::from_secs(5), Duration::from_millis(5), || {
        let queue = queue.clone();
        async move { queue.is_empty() && queue.in_flight() == 0 }
    })
    .await;
    assert!(drained, "queue should drain");

    queue.shut_down();
    for worker in workers {
        worker.await.expect("worker task should not panic");
    }

    assert_eq!(overlaps.load(Ordering::SeqCst), 0);
    assert!(processed.load(Ordering::SeqCst) >= 3);
    assert!(processed.load(Ordering::SeqCst) <= 200);
}

/// A key re-added while a worker holds it comes back exactly once after
/// `done`, even if it was re-added many times.
#[tokio::test]
async fn test_dirty_in_flight_key_redelivered_once() {
    let queue = WorkQueue::new();
    queue.add("default/web");

    let key = queue.get().await.expect("key available");
    for _ in 0..10 {
        queue.add("default/web");
    }
    assert!(queue.is_empty());

    queue.done(&key);
    assert_eq!(queue.len(), 1);

    let again = queue.get().await.expect("redelivered key");
    queue.done(&again);
    assert!(queue.is_empty());
    assert_eq!(queue.metrics().total_redelivered, 1);
}

/// After drain-shutdown completes there are no keys in flight and getters
/// observe `None`.
#[tokio::test(flavor = "multi_thread")]
async fn test_drain_shutdown_waits_for_workers() {
    let queue = WorkQueue::new();
    let finished = Arc::new(AtomicUsize::new(0));

    for idx in 0..4 {
        queue.add(format!("default/obj-{idx}"));
    }

    let workers: Vec<_> = (0..2)
        .map(|_| {
            let queue = queue.clone();
            let finished = Arc::clone(&finished);
            tokio::spawn(async move {
                while let Some(key) = queue.get().await {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    finished.fetch_add(1, Ordering::SeqCst);
                    queue.done(&key);
                }
            })
        })
        .collect();

    tokio::time::sleep(Duration::from_millis(5)).await;
    queue.shut_down_with_drain().await;
    assert!(queue.shutting_down());

    for worker in workers {
        worker.await.expect("worker task should not panic");
    }
    // Keys queued before shutdown are still handed out.
    assert_eq!(finished.load(Ordering::SeqCst), 4);
    assert_eq!(queue.in_flight(), 0);
    assert_eq!(queue.get().await, None);
}

#[tokio::test(start_paused = true)]
async fn test_delaying_queue_shares_metrics_with_inner_queue() {
    let metrics = Arc::new(QueueMetrics::new());
    let queue = DelayingQueue::with_metrics(Arc::clone(&metrics));

    queue.add_after("default/web", Duration::from_secs(1));
    queue.add("default/db");

    assert_eq!(queue.get().await, Some("default/db"));
    assert_eq!(queue.get().await, Some("default/web"));

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.total_delayed, 1);
    assert_eq!(snapshot.total_dequeued, 2);
}

#[tokio::test(start_paused = true)]
async fn test_rate_limited_queue_requeue_cycle() {
    let limiter =
        ItemExponentialFailure::new(Duration::from_millis(5), Duration::from_secs(1000)).unwrap();
    let queue = RateLimitedQueue::new(limiter);

    queue.add("default/web");
    let key = queue.get().await.unwrap();

    // Failed: hand it back with backoff.
    queue.add_rate_limited(key);
    queue.done(&key);
    assert_eq!(queue.num_requeues(&key), 1);

    let key = queue.get().await.unwrap();
    // Succeeded: clear history.
    queue.forget(&key);
    queue.done(&key);

    assert_eq!(queue.num_requeues(&key), 0);
    assert!(queue.is_empty());
    assert_eq!(queue.waiting_len(), 0);
}
