//! Port interfaces for the work-loop

use std::sync::Arc;

use async_trait::async_trait;
use syncloop_domain::{DynamicObject, Event, ObjectKey, Result};

use super::context::SyncContext;

/// Read access to the local object cache
#[async_trait]
pub trait Indexer: Send + Sync {
    /// Look up the cached object for `key`
    ///
    /// `Ok(None)` means the object is not (or no longer) in the cache. The
    /// returned object is shared with the cache and must be copied before it
    /// is handed out.
    async fn get_by_key(&self, key: &ObjectKey) -> Result<Option<Arc<DynamicObject>>>;
}

/// User reconciliation logic
#[async_trait]
pub trait Handler: Send + Sync {
    /// Reconcile one object
    ///
    /// An error requeues the key with backoff.
    async fn handle(&self, ctx: &SyncContext, event: Event) -> Result<()>;
}

/// Queue operations the worker loop consumes
#[async_trait]
pub trait WorkQueue: Send + Sync {
    /// Wait for the next key; `None` once the queue has shut down
    async fn get(&self) -> Option<ObjectKey>;

    /// Release a key obtained from `get`
    fn done(&self, key: &ObjectKey);

    /// Reset the key's requeue history
    fn forget(&self, key: &ObjectKey);

    /// Requeue the key after a backoff delay and count the requeue
    fn add_rate_limited(&self, key: ObjectKey);

    /// Requeues since the key was last forgotten
    fn num_requeues(&self, key: &ObjectKey) -> u32;
}
