//! Work queue and requeue rate limiting for reconciliation workers
//!
//! ## Submodules
//!
//! - **`queue`**: deduplicating work queue with in-flight exclusion, a
//!   delaying layer and a rate-limited layer
//! - **`retry`**: per-key and overall rate limiters that choose requeue
//!   delays and count requeues
//!
//! The queue never decides *whether* a key is retried; it only applies the
//! delay the limiter picks. Retry limits belong to the worker's policy.

pub mod queue;
pub mod retry;

pub use queue::{
    DelayingQueue, QueueKey, QueueMetrics, QueueMetricsSnapshot, RateLimitedQueue, WorkQueue,
};
pub use retry::{
    default_controller_rate_limiter, Bucket, ItemExponentialFailure, ItemFastSlow, MaxOf,
    RateLimiter,
};

// Re-export time abstractions from testing module
pub use crate::testing::time::{Clock, MockClock, SystemClock};
