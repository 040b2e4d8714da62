//! What happens to a key after a sync
//!
//! A key moves `Clean -> Failing(n) -> Clean | Dropped`. Success forgets the
//! key's history. Failure requeues it with backoff until it has been
//! requeued `max_retries` times; the next failure after that drops it.

use syncloop_domain::constants::DEFAULT_MAX_RETRIES;
use syncloop_domain::ObjectKey;
use tracing::{error, info};

use super::errors::SyncError;
use super::ports::WorkQueue;
use super::syncer::SyncStatus;

/// Result of applying the policy to one sync
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Succeeded; history forgotten
    Clean,
    /// Failed and requeued; `attempt` is the requeue count before this one
    Requeued { attempt: u32 },
    /// Failed with retries exhausted; history forgotten, key not requeued
    Dropped { attempts: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Apply the policy to the result of syncing `key`
    pub fn handle_result(
        &self,
        queue: &dyn WorkQueue,
        key: &ObjectKey,
        result: &Result<SyncStatus, SyncError>,
    ) -> SyncOutcome {
        let err = match result {
            Ok(_) => {
                queue.forget(key);
                return SyncOutcome::Clean;
            }
            Err(err) => err,
        };

        let requeues = queue.num_requeues(key);
        if requeues < self.max_retries {
            error!(key = %key, error = %err, attempt = requeues + 1, "Error syncing object");
            queue.add_rate_limited(key.clone());
            return SyncOutcome::Requeued { attempt: requeues };
        }

        queue.forget(key);
        info!(key = %key, error = %err, attempts = requeues, "Dropping object out of the queue");
        SyncOutcome::Dropped { attempts: requeues }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES)
    }
}
