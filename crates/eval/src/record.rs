//! Record access.
//!
//! Filters never assume a schema. They see a record only through the
//! [`Record`] trait: a named-property lookup plus an optional identity.

use std::collections::BTreeMap;

use crate::types::Value;

/// A feature or other structured item that filters are evaluated against.
pub trait Record {
    /// Look up a property. `None` means the property does not exist;
    /// expressions turn that into [`Value::Null`].
    fn property(&self, path: &str) -> Option<Value>;

    /// The record's identity, matched by Id filters.
    fn id(&self) -> Option<&str> {
        None
    }
}

/// Evaluating against `()` means "no record": every property is missing.
impl Record for () {
    fn property(&self, _path: &str) -> Option<Value> {
        None
    }
}

impl<R: Record + ?Sized> Record for &R {
    fn property(&self, path: &str) -> Option<Value> {
        (**self).property(path)
    }

    fn id(&self) -> Option<&str> {
        (**self).id()
    }
}

/// An in-memory record with flat property names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapRecord {
    id: Option<String>,
    properties: BTreeMap<String, Value>,
}

impl MapRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.properties.insert(name.into(), value.into());
    }
}

impl Record for MapRecord {
    fn property(&self, path: &str) -> Option<Value> {
        self.properties.get(path).cloned()
    }

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

/// A JSON document as a record.
///
/// Property paths use `/` to step into nested objects (`address/city`).
/// The record identity is the top-level `"id"` string, if present.
impl Record for serde_json::Value {
    fn property(&self, path: &str) -> Option<Value> {
        let mut current = self;
        for step in path.split('/').filter(|s| !s.is_empty()) {
            current = current.as_object()?.get(step)?;
        }
        Some(Value::from_json(current))
    }

    fn id(&self) -> Option<&str> {
        self.get("id").and_then(|v| v.as_str())
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
