use std::sync::Arc;
use std::time::Duration;

use syncloop_common::sync::{Bucket, ItemExponentialFailure, ItemFastSlow, MaxOf, RateLimiter};
use syncloop_domain::{ObjectKey, RateLimiterConfig};

use crate::errors::ControllerResult;

/// Build the requeue limiter described by `config`
///
/// Parameters are validated by the limiter constructors; an invalid
/// combination surfaces as a configuration error.
pub fn build_rate_limiter(
    config: &RateLimiterConfig,
) -> ControllerResult<Arc<dyn RateLimiter<ObjectKey>>> {
    let limiter: Arc<dyn RateLimiter<ObjectKey>> = match *config {
        RateLimiterConfig::Controller { base_delay_ms, max_delay_ms, qps, burst } => {
            let exponential: Box<dyn RateLimiter<ObjectKey>> =
                Box::new(exponential(base_delay_ms, max_delay_ms)?);
            let bucket: Box<dyn RateLimiter<ObjectKey>> = Box::new(Bucket::new(qps, burst)?);
            Arc::new(MaxOf::new(vec![exponential, bucket])?)
        }
        RateLimiterConfig::Exponential { base_delay_ms, max_delay_ms } => {
            Arc::new(exponential(base_delay_ms, max_delay_ms)?)
        }
        RateLimiterConfig::FastSlow { fast_delay_ms, slow_delay_ms, max_fast_attempts } => {
            Arc::new(ItemFastSlow::<ObjectKey>::new(
                Duration::from_millis(fast_delay_ms),
                Duration::from_millis(slow_delay_ms),
                max_fast_attempts,
            )?)
        }
        RateLimiterConfig::Bucket { qps, burst } => Arc::new(Bucket::new(qps, burst)?),
    };
    Ok(limiter)
}

fn exponential(
    base_delay_ms: u64,
    max_delay_ms: u64,
) -> ControllerResult<ItemExponentialFailure<ObjectKey>> {
    Ok(ItemExponentialFailure::new(
        Duration::from_millis(base_delay_ms),
        Duration::from_millis(max_delay_ms),
    )?)
}
