//! Source records
//!
//! One unit of input content (file path or URL) plus its processing status.
//! A record is created `Unhandled` at task construction, transitions once,
//! and lives and dies with its owning task.

use serde::{Deserialize, Serialize};

/// Opaque reference to input content (file path or URL).
///
/// Compared by identity when a worker reports completion, so it must stay
/// byte-for-byte stable for the lifetime of its task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceRef(String);

impl SourceRef {
    /// Wrap a raw path or URL.
    #[inline]
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Borrow the underlying reference.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SourceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SourceRef {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for SourceRef {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

/// Processing status of a single source within a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    /// Not yet picked up, or its worker has not finished.
    Unhandled,
    /// Successfully processed by the collaborator.
    Processed,
    /// Collaborator failed; the error is recorded on the record.
    Errored,
}

impl SourceStatus {
    /// Whether the source has left the `Unhandled` state.
    #[inline]
    #[must_use]
    pub fn is_handled(self) -> bool {
        !matches!(self, SourceStatus::Unhandled)
    }
}

/// A source and its mutable processing state. Owned by exactly one task.
#[derive(Debug, Clone)]
pub struct SourceRecord {
    /// The input content this record tracks.
    pub source: SourceRef,
    /// Current processing status.
    pub status: SourceStatus,
    /// Failure message, set when `status` is `Errored`.
    pub error: Option<String>,
}

impl SourceRecord {
    pub(crate) fn new(source: SourceRef) -> Self {
        Self {
            source,
            status: SourceStatus::Unhandled,
            error: None,
        }
    }
}

/// Errored source snapshot, surfaced through status polling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceError {
    /// The source that failed.
    pub source: SourceRef,
    /// What the collaborator reported.
    pub error: String,
}
