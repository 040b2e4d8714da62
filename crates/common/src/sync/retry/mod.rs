// Requeue rate limiters consulted when a key fails to sync

mod bucket;
pub mod constants;
mod limiter;

pub use bucket::Bucket;
pub use limiter::{
    default_controller_rate_limiter, ItemExponentialFailure, ItemFastSlow, MaxOf, RateLimiter,
};
