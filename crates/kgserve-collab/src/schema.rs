//! Opaque schema document.

use serde::{Deserialize, Serialize};

/// A detected graph schema, carried opaquely between the inference service
/// and the graph store. kgserve never interprets its contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaDoc(serde_json::Value);

impl SchemaDoc {
    /// Wrap a raw schema payload.
    #[inline]
    #[must_use]
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    /// Borrow the raw payload.
    #[inline]
    #[must_use]
    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }

    /// Unwrap the raw payload.
    #[inline]
    #[must_use]
    pub fn into_value(self) -> serde_json::Value {
        self.0
    }
}

impl From<serde_json::Value> for SchemaDoc {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}
