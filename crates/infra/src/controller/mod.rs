//! Controller runtime
//!
//! A [`Controller`] owns one rate-limited work queue and a pool of worker
//! tasks draining it. The watch layer feeds keys in through
//! [`Controller::enqueue`]; the workers run the core reconciliation loop.

mod lifecycle;
mod rate_limiter;

pub use lifecycle::Controller;
pub use rate_limiter::build_rate_limiter;
