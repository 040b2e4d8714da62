use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, trace};

use super::core::{QueueKey, WorkQueue};
use super::metrics::{QueueMetrics, QueueMetricsSnapshot};

/// Ready time used when `now + delay` is not representable
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// A key parked until `ready_at`
#[derive(Debug)]
struct WaitingEntry<K> {
    key: K,
    ready_at: Instant,
    sequence: u64,
}

// Reversed so that `BinaryHeap` pops the earliest ready time first, ties
// broken by insertion order.
impl<K> Ord for WaitingEntry<K> {
    fn cmp(&self, other: &Self) -> Ordering {
        other.ready_at.cmp(&self.ready_at).then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl<K> PartialOrd for WaitingEntry<K> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<K> PartialEq for WaitingEntry<K> {
    fn eq(&self, other: &Self) -> bool {
        self.ready_at == other.ready_at && self.sequence == other.sequence
    }
}

impl<K> Eq for WaitingEntry<K> {}

/// Heap of parked keys plus the authoritative ready time per key
///
/// The heap may hold stale entries for a key whose ready time was moved
/// earlier; those are skipped when popped.
struct WaitingSet<K> {
    heap: BinaryHeap<WaitingEntry<K>>,
    ready_at: HashMap<K, Instant>,
    next_sequence: u64,
}

impl<K: QueueKey> WaitingSet<K> {
    fn new() -> Self {
        Self { heap: BinaryHeap::new(), ready_at: HashMap::new(), next_sequence: 0 }
    }

    /// Returns false when the key was already waiting with an earlier or
    /// equal ready time.
    fn insert(&mut self, key: K, ready_at: Instant) -> bool {
        if let Some(existing) = self.ready_at.get(&key) {
            if *existing <= ready_at {
                return false;
            }
        }

        self.ready_at.insert(key.clone(), ready_at);
        let sequence = self.next_sequence;
        self.next_sequence = self.next_sequence.wrapping_add(1);
        self.heap.push(WaitingEntry { key, ready_at, sequence });
        true
    }

    /// Pop every entry ready at `now`
    fn take_ready(&mut self, now: Instant) -> Vec<K> {
        let mut ready = Vec::new();

        while let Some(entry) = self.heap.peek() {
            if entry.ready_at > now {
                break;
            }
            let Some(entry) = self.heap.pop() else { break };
            if self.ready_at.get(&entry.key) == Some(&entry.ready_at) {
                self.ready_at.remove(&entry.key);
                ready.push(entry.key);
            }
        }

        ready
    }

    fn next_ready_at(&self) -> Option<Instant> {
        self.heap.peek().map(|entry| entry.ready_at)
    }

    fn len(&self) -> usize {
        self.ready_at.len()
    }

    fn clear(&mut self) {
        self.heap.clear();
        self.ready_at.clear();
    }
}

struct Waiting<K> {
    entries: Mutex<WaitingSet<K>>,
    wake: Arc<Notify>,
    loop_started: AtomicBool,
}

impl<K> Drop for Waiting<K> {
    fn drop(&mut self) {
        // Stores a permit, so the background task observes the drop even
        // when it is not currently parked on the notify.
        self.wake.notify_one();
    }
}

/// Work queue that can hold keys back for a while before queueing them
///
/// Delayed keys wait in a min-heap ordered by ready time. A background task
/// on the ambient tokio runtime moves them into the underlying
/// [`WorkQueue`] when they become ready. A queue built outside a runtime
/// starts that task on the first `add_after` or `get` made from inside one;
/// until then callers can drive [`poll_waiting`](Self::poll_waiting)
/// themselves.
pub struct DelayingQueue<K: QueueKey> {
    queue: WorkQueue<K>,
    waiting: Arc<Waiting<K>>,
}

impl<K: QueueKey> DelayingQueue<K> {
    /// Create a delaying queue with fresh metrics
    pub fn new() -> Self {
        Self::with_metrics(Arc::new(QueueMetrics::new()))
    }

    /// Create a delaying queue reporting into the given metrics
    pub fn with_metrics(metrics: Arc<QueueMetrics>) -> Self {
        let queue = WorkQueue::with_metrics(metrics);
        let waiting = Arc::new(Waiting {
            entries: Mutex::new(WaitingSet::new()),
            wake: Arc::new(Notify::new()),
            loop_started: AtomicBool::new(false),
        });

        let delaying = Self { queue, waiting };
        if !delaying.ensure_waiting_loop() {
            debug!("No active Tokio runtime; delayed-key background task deferred");
        }
        delaying
    }

    /// Start the background task once, if a runtime is available
    ///
    /// Returns whether the task is running.
    fn ensure_waiting_loop(&self) -> bool {
        if self.waiting.loop_started.load(AtomicOrdering::Acquire) {
            return true;
        }
        let Ok(runtime) = Handle::try_current() else {
            return false;
        };
        if self
            .waiting
            .loop_started
            .compare_exchange(false, true, AtomicOrdering::AcqRel, AtomicOrdering::Acquire)
            .is_ok()
        {
            let queue = self.queue.clone();
            let waiting = Arc::downgrade(&self.waiting);
            let wake = Arc::clone(&self.waiting.wake);
            runtime.spawn(waiting_loop(queue, waiting, wake));
            trace!("Delayed-key background task started");
        }
        true
    }

    /// Add `key` once `delay` has elapsed
    ///
    /// A zero delay adds immediately. If the key is already waiting, the
    /// earlier of the two ready times wins.
    pub fn add_after(&self, key: K, delay: Duration) {
        if self.queue.shutting_down() {
            return;
        }

        if delay.is_zero() {
            self.queue.add(key);
            return;
        }

        self.ensure_waiting_loop();
        let now = Instant::now();
        let ready_at = now.checked_add(delay).unwrap_or_else(|| now + FAR_FUTURE);
        let inserted = self.waiting.entries.lock().insert(key.clone(), ready_at);
        if inserted {
            trace!(key = ?key, delay_ms = delay.as_millis() as u64, "Key parked");
            self.queue.metrics_handle().record_delayed();
            self.waiting.wake.notify_one();
        }
    }

    /// Move every waiting key whose delay has elapsed into the queue
    ///
    /// Returns the number of keys released.
    pub fn poll_waiting(&self) -> usize {
        release_ready(&self.queue, &self.waiting, Instant::now()).0
    }

    /// Number of keys currently parked
    pub fn waiting_len(&self) -> usize {
        self.waiting.entries.lock().len()
    }

    /// See [`WorkQueue::add`]
    pub fn add(&self, key: K) {
        self.queue.add(key);
    }

    /// See [`WorkQueue::get`]
    pub async fn get(&self) -> Option<K> {
        self.ensure_waiting_loop();
        self.queue.get().await
    }

    /// See [`WorkQueue::done`]
    pub fn done(&self, key: &K) {
        self.queue.done(key);
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn shutting_down(&self) -> bool {
        self.queue.shutting_down()
    }

    /// Shut down the queue and discard parked keys
    pub fn shut_down(&self) {
        self.queue.shut_down();
        self.discard_waiting();
    }

    /// Shut down, discard parked keys and wait for in-flight keys
    pub async fn shut_down_with_drain(&self) {
        self.discard_waiting();
        self.queue.shut_down_with_drain().await;
        self.waiting.wake.notify_one();
    }

    fn discard_waiting(&self) {
        let mut entries = self.waiting.entries.lock();
        if entries.len() > 0 {
            debug!(discarded = entries.len(), "Discarding parked keys on shutdown");
        }
        entries.clear();
        drop(entries);
        self.waiting.wake.notify_one();
    }

    pub fn metrics_handle(&self) -> Arc<QueueMetrics> {
        self.queue.metrics_handle()
    }

    pub fn metrics(&self) -> QueueMetricsSnapshot {
        self.queue.metrics()
    }
}

/// Release ready keys; returns the count and the next ready time
fn release_ready<K: QueueKey>(
    queue: &WorkQueue<K>,
    waiting: &Waiting<K>,
    now: Instant,
) -> (usize, Option<Instant>) {
    let (ready, next) = {
        let mut entries = waiting.entries.lock();
        let ready = entries.take_ready(now);
        (ready, entries.next_ready_at())
    };

    let released = ready.len();
    for key in ready {
        queue.add(key);
    }
    (released, next)
}

async fn waiting_loop<K: QueueKey>(queue: WorkQueue<K>, waiting: Weak<Waiting<K>>, wake: Arc<Notify>) {
    loop {
        let next = {
            let Some(waiting) = waiting.upgrade() else { break };
            if queue.shutting_down() {
                break;
            }
            release_ready(&queue, &waiting, Instant::now()).1
        };

        match next {
            Some(ready_at) => {
                tokio::select! {
                    () = tokio::time::sleep_until(ready_at) => {}
                    () = wake.notified() => {}
                }
            }
            None => wake.notified().await,
        }
    }

    trace!("Delayed-key background task stopped");
}

impl<K: QueueKey> Clone for DelayingQueue<K> {
    fn clone(&self) -> Self {
        Self { queue: self.queue.clone(), waiting: Arc::clone(&self.waiting) }
    }
}

impl<K: QueueKey> Default for DelayingQueue<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: QueueKey> fmt::Debug for DelayingQueue<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DelayingQueue")
            .field("queue", &self.queue)
            .field("waiting", &self.waiting_len())
            .finish()
    }
}
