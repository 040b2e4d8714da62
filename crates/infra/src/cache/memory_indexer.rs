use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use syncloop_core::Indexer;
use syncloop_domain::{DynamicObject, ObjectKey, Result};
use tracing::trace;

/// Thread-safe in-memory store of the latest object per key
///
/// Objects are stored behind `Arc` so lookups are cheap. Callers that hand an
/// object to user code must clone it first; the sync step does.
#[derive(Debug, Default)]
pub struct MemoryIndexer {
    objects: RwLock<HashMap<ObjectKey, Arc<DynamicObject>>>,
}

impl MemoryIndexer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the cache with a set of objects
    pub fn with_objects(objects: impl IntoIterator<Item = DynamicObject>) -> Self {
        let indexer = Self::new();
        for object in objects {
            indexer.add(object);
        }
        indexer
    }

    /// Insert or replace an object; returns its key
    pub fn add(&self, object: DynamicObject) -> ObjectKey {
        let key = object.key();
        trace!(key = %key, "Caching object");
        self.objects.write().insert(key.clone(), Arc::new(object));
        key
    }

    /// Replace an object, returning the previous version
    pub fn update(&self, object: DynamicObject) -> Option<Arc<DynamicObject>> {
        let key = object.key();
        trace!(key = %key, "Updating cached object");
        self.objects.write().insert(key, Arc::new(object))
    }

    /// Remove an object, returning it if it was cached
    pub fn delete(&self, key: &ObjectKey) -> Option<Arc<DynamicObject>> {
        trace!(key = %key, "Removing cached object");
        self.objects.write().remove(key)
    }

    pub fn get(&self, key: &ObjectKey) -> Option<Arc<DynamicObject>> {
        self.objects.read().get(key).cloned()
    }

    /// All cached keys, sorted
    pub fn list_keys(&self) -> Vec<ObjectKey> {
        let mut keys: Vec<ObjectKey> = self.objects.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }
}

#[async_trait]
impl Indexer for MemoryIndexer {
    async fn get_by_key(&self, key: &ObjectKey) -> Result<Option<Arc<DynamicObject>>> {
        Ok(self.get(key))
    }
}
