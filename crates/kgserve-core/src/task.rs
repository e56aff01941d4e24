//! Task: one asynchronous operation tracked by a token until complete.
//!
//! A task is an immutable descriptor (operation kind, target graph,
//! credential, source list) plus the mutable per-source statuses a poller
//! derives progress from. Statuses are written by worker contexts and read
//! by request contexts concurrently; one task-scoped lock keeps every
//! progress reading a consistent snapshot.

use crate::error::CoreError;
use crate::source::{SourceError, SourceRecord, SourceRef, SourceStatus};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Opaque unique identifier returned to a client for status polling.
///
/// 128-bit random (RFC 4122 v4); collisions are astronomically unlikely and
/// rejected explicitly by the registry rather than silently overwritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(Uuid);

impl Token {
    /// Generate a fresh random token.
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Token {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Kind of asynchronous operation a task tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Single schema inference call over the whole source set.
    SchemaDetection,
    /// Per-source knowledge-graph extraction fan-out.
    KgPopulate,
}

/// Target graph location in the external store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphTarget {
    /// Graph store host.
    pub host: String,
    /// Graph store port.
    pub port: u16,
    /// Graph name within the store.
    pub graph: String,
}

impl GraphTarget {
    /// Create a new target. Host and port are not validated here; a bad
    /// address surfaces later from the storage collaborator.
    #[inline]
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16, graph: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            graph: graph.into(),
        }
    }

    /// The companion target a detected schema is persisted under.
    #[inline]
    #[must_use]
    pub fn schema_target(&self) -> GraphTarget {
        GraphTarget {
            host: self.host.clone(),
            port: self.port,
            graph: format!("{}_schema", self.graph),
        }
    }
}

/// Collaborator credential, threaded explicitly through every call.
///
/// Never stored in ambient process state, so concurrent tasks with
/// different credentials cannot clobber each other.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApiKey(String);

impl ApiKey {
    /// Wrap a credential string.
    #[inline]
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Access the raw credential for a collaborator call.
    #[inline]
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Keep credentials out of logs.
        f.write_str("ApiKey(..)")
    }
}

/// One asynchronous operation and its per-source completion state.
#[derive(Debug)]
pub struct Task {
    token: Token,
    operation: Operation,
    target: GraphTarget,
    credential: ApiKey,
    sources: RwLock<Vec<SourceRecord>>,
}

impl Task {
    /// Create a task with a fresh token, all sources `Unhandled`.
    ///
    /// # Errors
    /// - `CoreError::NoSources` if the source list is empty (progress would
    ///   be undefined).
    pub fn new(
        operation: Operation,
        sources: Vec<SourceRef>,
        credential: ApiKey,
        target: GraphTarget,
    ) -> Result<Self, CoreError> {
        if sources.is_empty() {
            return Err(CoreError::NoSources);
        }

        Ok(Self {
            token: Token::generate(),
            operation,
            target,
            credential,
            sources: RwLock::new(sources.into_iter().map(SourceRecord::new).collect()),
        })
    }

    /// Token issued to the client at construction.
    #[inline]
    #[must_use]
    pub fn token(&self) -> Token {
        self.token
    }

    /// Operation kind.
    #[inline]
    #[must_use]
    pub fn operation(&self) -> Operation {
        self.operation
    }

    /// Target graph location.
    #[inline]
    #[must_use]
    pub fn target(&self) -> &GraphTarget {
        &self.target
    }

    /// Collaborator credential.
    #[inline]
    #[must_use]
    pub fn credential(&self) -> &ApiKey {
        &self.credential
    }

    /// Snapshot of the owned source references, in submission order.
    #[must_use]
    pub fn source_refs(&self) -> Vec<SourceRef> {
        self.sources.read().iter().map(|r| r.source.clone()).collect()
    }

    /// Number of owned sources.
    #[must_use]
    pub fn source_count(&self) -> usize {
        self.sources.read().len()
    }

    /// Record the status a worker reports for one of the task's sources.
    ///
    /// # Errors
    /// - `CoreError::UnknownSource` if the source is not owned by this task.
    pub fn update_source_status(
        &self,
        source: &SourceRef,
        status: SourceStatus,
    ) -> Result<(), CoreError> {
        let mut sources = self.sources.write();
        let record = sources
            .iter_mut()
            .find(|r| r.source == *source)
            .ok_or_else(|| CoreError::UnknownSource(source.to_string()))?;
        record.status = status;
        Ok(())
    }

    /// Mark one source `Errored` and capture what the collaborator reported.
    ///
    /// # Errors
    /// - `CoreError::UnknownSource` if the source is not owned by this task.
    pub fn record_source_error(
        &self,
        source: &SourceRef,
        error: impl Into<String>,
    ) -> Result<(), CoreError> {
        let mut sources = self.sources.write();
        let record = sources
            .iter_mut()
            .find(|r| r.source == *source)
            .ok_or_else(|| CoreError::UnknownSource(source.to_string()))?;
        record.status = SourceStatus::Errored;
        record.error = Some(error.into());
        Ok(())
    }

    /// Mark every source `Processed` in one step.
    ///
    /// Schema detection completes all sources as a single atomic unit, so
    /// progress jumps straight from 0 to 1 with no intermediate reading.
    pub fn mark_all_processed(&self) {
        let mut sources = self.sources.write();
        for record in sources.iter_mut() {
            record.status = SourceStatus::Processed;
        }
    }

    /// Mark every still-`Unhandled` source `Errored` with the given message.
    ///
    /// Already-processed sources keep their status, so progress stays
    /// monotone.
    pub fn mark_unhandled_errored(&self, error: &str) {
        let mut sources = self.sources.write();
        for record in sources.iter_mut() {
            if record.status == SourceStatus::Unhandled {
                record.status = SourceStatus::Errored;
                record.error = Some(error.to_string());
            }
        }
    }

    /// Fraction of sources that have left the `Unhandled` state, in [0, 1].
    ///
    /// Both aggregate counts are read under one lock guard, so concurrent
    /// status writes can never produce a torn reading.
    #[must_use]
    pub fn progress(&self) -> f64 {
        let sources = self.sources.read();
        let handled = sources.iter().filter(|r| r.status.is_handled()).count();
        handled as f64 / sources.len() as f64
    }

    /// Whether every source has been handled.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.sources.read().iter().all(|r| r.status.is_handled())
    }

    /// Snapshot of the errored sources, for the status reply.
    #[must_use]
    pub fn source_errors(&self) -> Vec<SourceError> {
        self.sources
            .read()
            .iter()
            .filter(|r| r.status == SourceStatus::Errored)
            .map(|r| SourceError {
                source: r.source.clone(),
                error: r.error.clone().unwrap_or_default(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(srcs: &[&str]) -> Task {
        Task::new(
            Operation::KgPopulate,
            srcs.iter().copied().map(SourceRef::new).collect(),
            ApiKey::new("sk-test"),
            GraphTarget::new("localhost", 6379, "movies"),
        )
        .unwrap()
    }

    #[test]
    fn new_task_rejects_empty_sources() {
        let result = Task::new(
            Operation::SchemaDetection,
            Vec::new(),
            ApiKey::new("sk-test"),
            GraphTarget::new("localhost", 6379, "movies"),
        );
        assert_eq!(result.unwrap_err(), CoreError::NoSources);
    }

    #[test]
    fn tokens_are_distinct() {
        let a = task(&["x"]);
        let b = task(&["x"]);
        assert_ne!(a.token(), b.token());
    }

    #[test]
    fn token_round_trips_through_display() {
        let token = Token::generate();
        let parsed: Token = token.to_string().parse().unwrap();
        assert_eq!(token, parsed);
    }

    #[test]
    fn progress_starts_at_zero() {
        let t = task(&["a", "b", "c"]);
        assert_eq!(t.progress(), 0.0);
        assert!(!t.is_complete());
    }

    #[test]
    fn progress_counts_handled_sources() {
        let t = task(&["a", "b", "c"]);

        // B completes first; order between sources is arbitrary.
        t.update_source_status(&SourceRef::new("b"), SourceStatus::Processed)
            .unwrap();
        assert!((t.progress() - 1.0 / 3.0).abs() < 1e-12);

        t.record_source_error(&SourceRef::new("c"), "boom").unwrap();
        assert!((t.progress() - 2.0 / 3.0).abs() < 1e-12);

        t.update_source_status(&SourceRef::new("a"), SourceStatus::Processed)
            .unwrap();
        assert_eq!(t.progress(), 1.0);
        assert!(t.is_complete());
    }

    #[test]
    fn update_unknown_source_fails() {
        let t = task(&["a"]);
        let err = t
            .update_source_status(&SourceRef::new("ghost"), SourceStatus::Processed)
            .unwrap_err();
        assert_eq!(err, CoreError::UnknownSource("ghost".to_string()));
    }

    #[test]
    fn mark_all_processed_is_atomic() {
        let t = task(&["a", "b"]);
        assert_eq!(t.progress(), 0.0);
        t.mark_all_processed();
        assert_eq!(t.progress(), 1.0);
    }

    #[test]
    fn mark_unhandled_errored_preserves_processed() {
        let t = task(&["a", "b"]);
        t.update_source_status(&SourceRef::new("a"), SourceStatus::Processed)
            .unwrap();
        t.mark_unhandled_errored("timed out");

        let errors = t.source_errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].source.as_str(), "b");
        assert_eq!(errors[0].error, "timed out");
        assert_eq!(t.progress(), 1.0);
    }

    #[test]
    fn schema_target_appends_suffix() {
        let target = GraphTarget::new("localhost", 6379, "movies");
        assert_eq!(target.schema_target().graph, "movies_schema");
        assert_eq!(target.schema_target().port, 6379);
    }

    #[test]
    fn api_key_debug_redacts() {
        let key = ApiKey::new("sk-secret");
        assert_eq!(format!("{key:?}"), "ApiKey(..)");
        assert_eq!(key.expose(), "sk-secret");
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn status_strategy() -> impl Strategy<Value = SourceStatus> {
            prop_oneof![
                Just(SourceStatus::Unhandled),
                Just(SourceStatus::Processed),
                Just(SourceStatus::Errored),
            ]
        }

        proptest! {
            #[test]
            fn progress_is_exact_and_bounded(
                statuses in proptest::collection::vec(status_strategy(), 1..48)
            ) {
                let refs: Vec<SourceRef> = (0..statuses.len())
                    .map(|i| SourceRef::new(format!("src-{i}")))
                    .collect();
                let t = Task::new(
                    Operation::KgPopulate,
                    refs.clone(),
                    ApiKey::new("sk-test"),
                    GraphTarget::new("localhost", 6379, "g"),
                )
                .unwrap();

                for (source, status) in refs.iter().zip(&statuses) {
                    if status.is_handled() {
                        t.update_source_status(source, *status).unwrap();
                    }
                }

                let handled = statuses.iter().filter(|s| s.is_handled()).count();
                let expected = handled as f64 / statuses.len() as f64;
                prop_assert!((t.progress() - expected).abs() < 1e-12);
                prop_assert!((0.0..=1.0).contains(&t.progress()));
            }
        }
    }
}
