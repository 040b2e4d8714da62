// Constants for the requeue rate limiters
use std::time::Duration;

/// Base delay of the per-key exponential limiter
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(5);

/// Cap of the per-key exponential limiter
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(1000);

/// Maximum exponent for exponential backoff calculation to prevent overflow
pub const MAX_BACKOFF_EXPONENT: u32 = 30;

/// Overall token bucket: sustained rate in tokens per second
pub const DEFAULT_BUCKET_QPS: f64 = 10.0;

/// Overall token bucket: maximum burst
pub const DEFAULT_BUCKET_BURST: u32 = 100;

/// Longest wait the overall token bucket hands out for a single reservation
pub const MAX_BUCKET_WAIT: Duration = DEFAULT_MAX_DELAY;
