//! The sync step: resolve a key and hand a private copy to the handler

use std::sync::Arc;

use syncloop_domain::{DynamicObject, Event, ObjectKey};
use tracing::{debug, info};

use super::context::SyncContext;
use super::errors::SyncError;
use super::ports::{Handler, Indexer};

/// What a successful sync did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// The handler ran and returned success
    Reconciled,
    /// The object is gone from the cache; the handler was not called
    Absent,
}

/// Resolves keys through the cache and invokes the handler
#[derive(Clone)]
pub struct Syncer {
    indexer: Arc<dyn Indexer>,
    handler: Arc<dyn Handler>,
}

impl Syncer {
    pub fn new(indexer: Arc<dyn Indexer>, handler: Arc<dyn Handler>) -> Self {
        Self { indexer, handler }
    }

    /// Sync one key
    ///
    /// A lookup failure is returned as [`SyncError::Indexer`]. A key that is
    /// not in the cache is a success with [`SyncStatus::Absent`]: no
    /// deletion event is synthesised. Otherwise the handler is called exactly
    /// once with a deep copy of the cached object, and its outcome is
    /// returned unchanged.
    pub async fn sync(&self, ctx: &SyncContext, key: &ObjectKey) -> Result<SyncStatus, SyncError> {
        let cached = self.indexer.get_by_key(key).await.map_err(SyncError::Indexer)?;

        let Some(cached) = cached else {
            info!(key = %key, "Object ({key}) is deleted");
            return Ok(SyncStatus::Absent);
        };

        // The cache keeps its own instance; the handler owns this one.
        let object = DynamicObject::clone(&cached);
        drop(cached);

        debug!(key = %key, worker = ctx.worker_id, "Invoking handler");
        self.handler.handle(ctx, Event::observed(object)).await.map_err(SyncError::Handler)?;
        Ok(SyncStatus::Reconciled)
    }
}

impl std::fmt::Debug for Syncer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Syncer").finish_non_exhaustive()
    }
}
