//! Reconciliation work-loop
//!
//! A worker takes a key from the [`WorkQueue`](ports::WorkQueue), resolves
//! it through the [`Indexer`](ports::Indexer), hands a private copy of the
//! object to the [`Handler`](ports::Handler), and lets the
//! [`RetryPolicy`](retry_policy::RetryPolicy) decide what happens to the key
//! next.

pub mod context;
pub mod errors;
pub mod metrics;
pub mod ports;
mod queue_adapter;
pub mod retry_policy;
pub mod syncer;
pub mod worker;
