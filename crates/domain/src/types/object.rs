//! Unstructured objects as stored in the cache

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::key::ObjectKey;

/// Standard object metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation: Option<i64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_timestamp: Option<DateTime<Utc>>,
}

impl ObjectMeta {
    pub fn namespaced(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self { namespace: Some(namespace.into()), name: name.into(), ..Self::default() }
    }

    pub fn cluster_scoped(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Self::default() }
    }
}

/// An object of any kind, with its payload kept as JSON
///
/// Everything besides `apiVersion`, `kind` and `metadata` (typically `spec`
/// and `status`) lands in `data`. Cloning produces a fully independent copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DynamicObject {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

impl DynamicObject {
    pub fn new(api_version: impl Into<String>, kind: impl Into<String>, metadata: ObjectMeta) -> Self {
        Self { api_version: api_version.into(), kind: kind.into(), metadata, data: Map::new() }
    }

    /// Set a top-level payload field such as `spec` or `status`
    #[must_use]
    pub fn with_field(mut self, field: impl Into<String>, value: Value) -> Self {
        self.data.insert(field.into(), value);
        self
    }

    /// Cache key: `namespace/name`, or `name` when cluster-scoped
    pub fn key(&self) -> ObjectKey {
        match self.metadata.namespace.as_deref() {
            Some(namespace) if !namespace.is_empty() => {
                ObjectKey::new(format!("{namespace}/{}", self.metadata.name))
            }
            _ => ObjectKey::new(self.metadata.name.clone()),
        }
    }

    pub fn field(&self, field: &str) -> Option<&Value> {
        self.data.get(field)
    }

    /// Whether deletion has been requested but finalizers have not finished
    pub fn is_being_deleted(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }
}
