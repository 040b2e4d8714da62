use std::fmt;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::trace;

use super::constants::{DEFAULT_BUCKET_BURST, DEFAULT_BUCKET_QPS, MAX_BUCKET_WAIT};
use super::limiter::RateLimiter;
use crate::error::{CommonError, CommonResult};
use crate::testing::{Clock, SystemClock};

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// Overall token bucket shared by every key
///
/// Starts full with `burst` tokens and refills at `qps` tokens per second.
/// Each call to [`when`](RateLimiter::when) reserves one token; when the
/// bucket is empty the reservation goes into debt and the returned delay is
/// the time until that token exists, capped at [`MAX_BUCKET_WAIT`]. Keys
/// have no individual history, so [`num_requeues`](RateLimiter::num_requeues)
/// is always zero.
pub struct Bucket<C: Clock = SystemClock> {
    qps: f64,
    burst: u32,
    state: Mutex<BucketState>,
    clock: C,
}

impl Bucket<SystemClock> {
    pub fn new(qps: f64, burst: u32) -> CommonResult<Self> {
        Self::with_clock(qps, burst, SystemClock)
    }
}

impl<C: Clock> Bucket<C> {
    /// Create a bucket with custom clock
    pub fn with_clock(qps: f64, burst: u32, clock: C) -> CommonResult<Self> {
        if !qps.is_finite() || qps <= 0.0 {
            return Err(CommonError::config_field("qps", format!("qps must be positive, got {qps}")));
        }
        if burst == 0 {
            return Err(CommonError::config_field("burst", "burst must be at least 1"));
        }

        Ok(Self::unchecked(qps, burst, clock))
    }

    fn unchecked(qps: f64, burst: u32, clock: C) -> Self {
        let state = BucketState { tokens: f64::from(burst), last_refill: clock.now() };
        Self { qps, burst, state: Mutex::new(state), clock }
    }

    pub fn qps(&self) -> f64 {
        self.qps
    }

    pub fn burst(&self) -> u32 {
        self.burst
    }

    /// Reserve one token and return how long to wait for it
    ///
    /// Never exceeds [`MAX_BUCKET_WAIT`], however small `qps` is.
    pub fn reserve(&self) -> Duration {
        let now = self.clock.now();
        let mut state = self.state.lock();

        let elapsed = now.saturating_duration_since(state.last_refill);
        state.tokens = (state.tokens + elapsed.as_secs_f64() * self.qps).min(f64::from(self.burst));
        state.last_refill = now;
        state.tokens -= 1.0;

        if state.tokens >= 0.0 {
            Duration::ZERO
        } else {
            let wait = Duration::try_from_secs_f64(-state.tokens / self.qps)
                .map_or(MAX_BUCKET_WAIT, |wait| wait.min(MAX_BUCKET_WAIT));
            trace!(tokens = state.tokens, wait_ms = wait.as_millis() as u64, "Token bucket in debt");
            wait
        }
    }

    /// Tokens currently available (negative while reservations are in debt)
    pub fn available(&self) -> f64 {
        let now = self.clock.now();
        let state = self.state.lock();
        let elapsed = now.saturating_duration_since(state.last_refill);
        (state.tokens + elapsed.as_secs_f64() * self.qps).min(f64::from(self.burst))
    }
}

impl Default for Bucket<SystemClock> {
    /// 10 qps with a burst of 100
    fn default() -> Self {
        Self::unchecked(DEFAULT_BUCKET_QPS, DEFAULT_BUCKET_BURST, SystemClock)
    }
}

impl<K, C: Clock> RateLimiter<K> for Bucket<C> {
    fn when(&self, _key: &K) -> Duration {
        self.reserve()
    }

    fn forget(&self, _key: &K) {}

    fn num_requeues(&self, _key: &K) -> u32 {
        0
    }
}

impl<C: Clock> fmt::Debug for Bucket<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bucket")
            .field("qps", &self.qps)
            .field("burst", &self.burst)
            .field("state", &*self.state.lock())
            .finish()
    }
}
