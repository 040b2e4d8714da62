//! Object keys
//!
//! A key is `namespace/name` for namespaced objects and `name` for
//! cluster-scoped ones. The work queue treats keys as opaque; only the cache
//! and handlers look inside them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::KEY_SEPARATOR;
use crate::errors::{DomainError, Result};

/// Identifier of an object in the cache and in the work queue
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectKey(String);

impl ObjectKey {
    /// Wrap a key without validating it
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Build a key from its parts; an empty namespace means cluster-scoped
    pub fn from_parts(namespace: &str, name: &str) -> Result<Self> {
        if name.is_empty() {
            return Err(DomainError::InvalidKey("name must not be empty".to_string()));
        }
        if name.contains(KEY_SEPARATOR) || namespace.contains(KEY_SEPARATOR) {
            return Err(DomainError::InvalidKey(format!(
                "namespace '{namespace}' and name '{name}' must not contain '{KEY_SEPARATOR}'"
            )));
        }

        if namespace.is_empty() {
            Ok(Self(name.to_string()))
        } else {
            Ok(Self(format!("{namespace}{KEY_SEPARATOR}{name}")))
        }
    }

    /// Parse and validate a key
    pub fn parse(key: &str) -> Result<Self> {
        let parsed = Self(key.to_string());
        parsed.split()?;
        Ok(parsed)
    }

    /// Split into `(namespace, name)`; namespace is empty for
    /// cluster-scoped keys
    pub fn split(&self) -> Result<(&str, &str)> {
        let mut parts = self.0.split(KEY_SEPARATOR);
        let (namespace, name) = match (parts.next(), parts.next(), parts.next()) {
            (Some(name), None, None) => ("", name),
            (Some(namespace), Some(name), None) => (namespace, name),
            _ => {
                return Err(DomainError::InvalidKey(format!(
                    "unexpected key format: '{}'",
                    self.0
                )))
            }
        };

        if name.is_empty() {
            return Err(DomainError::InvalidKey(format!("key '{}' has an empty name", self.0)));
        }
        Ok((namespace, name))
    }

    pub fn namespace(&self) -> Option<&str> {
        match self.split() {
            Ok(("", _)) | Err(_) => None,
            Ok((namespace, _)) => Some(namespace),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ObjectKey {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl From<&str> for ObjectKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for ObjectKey {
    fn from(key: String) -> Self {
        Self::new(key)
    }
}

impl AsRef<str> for ObjectKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
