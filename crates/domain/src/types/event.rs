use serde::{Deserialize, Serialize};

use super::object::DynamicObject;

/// What a handler receives for one reconciliation
///
/// The object is a private copy: handlers may mutate it freely without
/// affecting the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub object: Option<DynamicObject>,
    pub deleted: bool,
}

impl Event {
    /// The object exists in the cache
    pub fn observed(object: DynamicObject) -> Self {
        Self { object: Some(object), deleted: false }
    }

    /// The object is gone
    pub fn deleted() -> Self {
        Self { object: None, deleted: true }
    }
}
