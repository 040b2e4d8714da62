//! Per-key requeue rate limiters
//!
//! A [`RateLimiter`] decides how long a failed key waits before it is handed
//! to a worker again, and counts how often that has happened. The worker's
//! retry policy reads the count to decide when to give up on a key.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::bucket::Bucket;
use super::constants::{DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY, MAX_BACKOFF_EXPONENT};
use crate::error::{CommonError, CommonResult};
use crate::sync::queue::QueueKey;
use crate::testing::SystemClock;

/// Chooses the requeue delay for a key
pub trait RateLimiter<K>: Send + Sync {
    /// Delay before `key` may be processed again
    ///
    /// Each call counts as one requeue of `key`.
    fn when(&self, key: &K) -> Duration;

    /// Drop all history for `key`
    fn forget(&self, key: &K);

    /// Requeues of `key` since it was last forgotten
    fn num_requeues(&self, key: &K) -> u32;
}

impl<K, L> RateLimiter<K> for Box<L>
where
    L: RateLimiter<K> + ?Sized,
{
    fn when(&self, key: &K) -> Duration {
        (**self).when(key)
    }

    fn forget(&self, key: &K) {
        (**self).forget(key);
    }

    fn num_requeues(&self, key: &K) -> u32 {
        (**self).num_requeues(key)
    }
}

impl<K, L> RateLimiter<K> for Arc<L>
where
    L: RateLimiter<K> + ?Sized,
{
    fn when(&self, key: &K) -> Duration {
        (**self).when(key)
    }

    fn forget(&self, key: &K) {
        (**self).forget(key);
    }

    fn num_requeues(&self, key: &K) -> u32 {
        (**self).num_requeues(key)
    }
}

/// Per-key exponential backoff: `base_delay * 2^failures`, capped at
/// `max_delay`
pub struct ItemExponentialFailure<K: QueueKey> {
    base_delay: Duration,
    max_delay: Duration,
    failures: Mutex<HashMap<K, u32>>,
}

impl<K: QueueKey> ItemExponentialFailure<K> {
    pub fn new(base_delay: Duration, max_delay: Duration) -> CommonResult<Self> {
        if base_delay.is_zero() {
            return Err(CommonError::config_field("base_delay", "base_delay must be greater than zero"));
        }
        if max_delay < base_delay {
            return Err(CommonError::config_field(
                "max_delay",
                format!("max_delay ({max_delay:?}) must not be below base_delay ({base_delay:?})"),
            ));
        }

        Ok(Self::unchecked(base_delay, max_delay))
    }

    fn unchecked(base_delay: Duration, max_delay: Duration) -> Self {
        Self { base_delay, max_delay, failures: Mutex::new(HashMap::new()) }
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    fn delay_for(&self, exponent: u32) -> Duration {
        let factor = 1u32 << exponent.min(MAX_BACKOFF_EXPONENT);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

impl<K: QueueKey> Default for ItemExponentialFailure<K> {
    /// 5ms doubling up to 1000s
    fn default() -> Self {
        Self::unchecked(DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY)
    }
}

impl<K: QueueKey> RateLimiter<K> for ItemExponentialFailure<K> {
    fn when(&self, key: &K) -> Duration {
        let exponent = {
            let mut failures = self.failures.lock();
            let count = failures.entry(key.clone()).or_insert(0);
            let exponent = *count;
            *count = count.saturating_add(1);
            exponent
        };
        self.delay_for(exponent)
    }

    fn forget(&self, key: &K) {
        self.failures.lock().remove(key);
    }

    fn num_requeues(&self, key: &K) -> u32 {
        self.failures.lock().get(key).copied().unwrap_or(0)
    }
}

impl<K: QueueKey> fmt::Debug for ItemExponentialFailure<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ItemExponentialFailure")
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .field("tracked_keys", &self.failures.lock().len())
            .finish()
    }
}

/// `fast_delay` for the first `max_fast_attempts` requeues of a key, then
/// `slow_delay`
pub struct ItemFastSlow<K: QueueKey> {
    fast_delay: Duration,
    slow_delay: Duration,
    max_fast_attempts: u32,
    attempts: Mutex<HashMap<K, u32>>,
}

impl<K: QueueKey> ItemFastSlow<K> {
    pub fn new(
        fast_delay: Duration,
        slow_delay: Duration,
        max_fast_attempts: u32,
    ) -> CommonResult<Self> {
        if slow_delay < fast_delay {
            return Err(CommonError::config_field(
                "slow_delay",
                format!("slow_delay ({slow_delay:?}) must not be below fast_delay ({fast_delay:?})"),
            ));
        }

        Ok(Self { fast_delay, slow_delay, max_fast_attempts, attempts: Mutex::new(HashMap::new()) })
    }
}

impl<K: QueueKey> RateLimiter<K> for ItemFastSlow<K> {
    fn when(&self, key: &K) -> Duration {
        let attempts = {
            let mut attempts = self.attempts.lock();
            let count = attempts.entry(key.clone()).or_insert(0);
            *count = count.saturating_add(1);
            *count
        };

        if attempts <= self.max_fast_attempts {
            self.fast_delay
        } else {
            self.slow_delay
        }
    }

    fn forget(&self, key: &K) {
        self.attempts.lock().remove(key);
    }

    fn num_requeues(&self, key: &K) -> u32 {
        self.attempts.lock().get(key).copied().unwrap_or(0)
    }
}

impl<K: QueueKey> fmt::Debug for ItemFastSlow<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ItemFastSlow")
            .field("fast_delay", &self.fast_delay)
            .field("slow_delay", &self.slow_delay)
            .field("max_fast_attempts", &self.max_fast_attempts)
            .finish_non_exhaustive()
    }
}

/// Combines limiters: the longest delay and the highest requeue count win
pub struct MaxOf<K> {
    limiters: Vec<Box<dyn RateLimiter<K>>>,
}

impl<K> MaxOf<K> {
    pub fn new(limiters: Vec<Box<dyn RateLimiter<K>>>) -> CommonResult<Self> {
        if limiters.is_empty() {
            return Err(CommonError::config("MaxOf requires at least one rate limiter"));
        }
        Ok(Self { limiters })
    }

    pub fn len(&self) -> usize {
        self.limiters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.limiters.is_empty()
    }
}

impl<K> RateLimiter<K> for MaxOf<K> {
    fn when(&self, key: &K) -> Duration {
        // Every limiter is consulted so each records the requeue.
        self.limiters.iter().map(|limiter| limiter.when(key)).max().unwrap_or(Duration::ZERO)
    }

    fn forget(&self, key: &K) {
        for limiter in &self.limiters {
            limiter.forget(key);
        }
    }

    fn num_requeues(&self, key: &K) -> u32 {
        self.limiters.iter().map(|limiter| limiter.num_requeues(key)).max().unwrap_or(0)
    }
}

impl<K> fmt::Debug for MaxOf<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MaxOf").field("limiters", &self.limiters.len()).finish()
    }
}

/// Limiter used by controllers unless configured otherwise
///
/// Per-key exponential backoff from 5ms to 1000s, combined with an overall
/// token bucket of 10 qps and a burst of 100.
pub fn default_controller_rate_limiter<K: QueueKey>() -> MaxOf<K> {
    let exponential: Box<dyn RateLimiter<K>> = Box::new(ItemExponentialFailure::<K>::default());
    let bucket: Box<dyn RateLimiter<K>> = Box::new(Bucket::<SystemClock>::default());
    MaxOf { limiters: vec![exponential, bucket] }
}
