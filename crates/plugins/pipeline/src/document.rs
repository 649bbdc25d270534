//! Documents passed between pipeline stages.
//!
//! [`RawDocument`] holds extracted field values still in tracker shape.
//! [`NormalizedDocument`] only ever comes out of
//! [`postprocess`](crate::postprocess::postprocess) and holds JSON-safe values.
//! The two are separate types so a document cannot be post-processed twice.

use serde::Serialize;
use serde_json::{Map, Value};

/// Extracted fields, in requested order, before post-processing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawDocument {
    fields: Map<String, Value>,
}

impl RawDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.fields.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub(crate) fn into_fields(self) -> Map<String, Value> {
        self.fields
    }
}

/// Prompt-ready document. Serializes as a flat JSON object in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct NormalizedDocument {
    fields: Map<String, Value>,
}

impl NormalizedDocument {
    pub(crate) fn from_fields(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Append a value, e.g. the key of the issue or a collector result.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
