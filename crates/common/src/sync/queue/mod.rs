// Controller work queue
// Layered as: basic dedup queue -> delaying queue -> rate-limited queue

mod core;
mod delaying;
pub mod metrics;
mod rate_limited;

pub use self::core::{QueueKey, WorkQueue};
pub use self::delaying::DelayingQueue;
pub use self::metrics::{QueueMetrics, QueueMetricsSnapshot};
pub use self::rate_limited::RateLimitedQueue;
