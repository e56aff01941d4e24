//! Deterministic in-process collaborators for tests and local development.
//!
//! Units of work complete immediately unless a test holds them open with a
//! gate and releases them on cue, and succeed unless a failure has been
//! scripted. Clones share state, so a test can keep a handle while the
//! dispatcher owns the trait objects.

use crate::error::CollabError;
use crate::schema::SchemaDoc;
use crate::traits::{GraphExtractor, GraphStore, SchemaDetector};
use async_trait::async_trait;
use kgserve_core::{ApiKey, GraphTarget, SourceRef};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// One-shot async gate: closed until opened, then permanently open.
#[derive(Debug, Default)]
struct Gate {
    released: AtomicBool,
    notify: Notify,
}

impl Gate {
    async fn wait(&self) {
        if self.released.load(Ordering::Acquire) {
            return;
        }
        let notified = self.notify.notified();
        tokio::pin!(notified);
        // `notify_waiters` only wakes already-registered waiters, and
        // creating the future does not register. Enable first, then
        // re-check: any open after the load finds us registered.
        notified.as_mut().enable();
        if self.released.load(Ordering::Acquire) {
            return;
        }
        notified.await;
    }

    fn open(&self) {
        self.released.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }
}

#[derive(Debug, Default)]
struct StubState {
    source_gates: Mutex<HashMap<String, Arc<Gate>>>,
    source_failures: Mutex<HashMap<String, String>>,
    detect_gate: Mutex<Option<Arc<Gate>>>,
    detect_failure: Mutex<Option<String>>,
    persist_failure: Mutex<Option<String>>,
    persisted: Mutex<Vec<String>>,
    processed: Mutex<Vec<String>>,
}

/// In-process implementation of all three collaborator seams.
#[derive(Debug, Clone, Default)]
pub struct StubCollaborator {
    state: Arc<StubState>,
}

impl StubCollaborator {
    /// A stub where everything completes immediately and succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold the extraction of one source open until released.
    pub fn hold_source(&self, source: &str) {
        self.state
            .source_gates
            .lock()
            .insert(source.to_string(), Arc::new(Gate::default()));
    }

    /// Release a held source.
    pub fn release_source(&self, source: &str) {
        if let Some(gate) = self.state.source_gates.lock().get(source) {
            gate.open();
        }
    }

    /// Script an extraction failure for one source.
    pub fn fail_source(&self, source: &str, message: &str) {
        self.state
            .source_failures
            .lock()
            .insert(source.to_string(), message.to_string());
    }

    /// Hold the whole schema-detection call open until released.
    pub fn hold_detection(&self) {
        *self.state.detect_gate.lock() = Some(Arc::new(Gate::default()));
    }

    /// Release a held detection call.
    pub fn release_detection(&self) {
        if let Some(gate) = self.state.detect_gate.lock().as_ref() {
            gate.open();
        }
    }

    /// Script a schema-detection failure.
    pub fn fail_detection(&self, message: &str) {
        *self.state.detect_failure.lock() = Some(message.to_string());
    }

    /// Script a schema-persistence failure.
    pub fn fail_persist(&self, message: &str) {
        *self.state.persist_failure.lock() = Some(message.to_string());
    }

    /// Sources extracted so far, in completion order.
    #[must_use]
    pub fn processed_sources(&self) -> Vec<String> {
        self.state.processed.lock().clone()
    }

    /// Graph names schemas were persisted under.
    #[must_use]
    pub fn persisted_graphs(&self) -> Vec<String> {
        self.state.persisted.lock().clone()
    }
}

fn scripted_failure(message: String) -> CollabError {
    CollabError::Service {
        status: 500,
        message,
    }
}

#[async_trait]
impl SchemaDetector for StubCollaborator {
    async fn auto_detect(
        &self,
        sources: &[SourceRef],
        _key: &ApiKey,
    ) -> Result<SchemaDoc, CollabError> {
        let gate = self.state.detect_gate.lock().clone();
        if let Some(gate) = gate {
            gate.wait().await;
        }

        if let Some(message) = self.state.detect_failure.lock().clone() {
            return Err(scripted_failure(message));
        }

        Ok(SchemaDoc::new(serde_json::json!({
            "entities": [],
            "relations": [],
            "sources": sources.iter().map(SourceRef::as_str).collect::<Vec<_>>(),
        })))
    }
}

#[async_trait]
impl GraphStore for StubCollaborator {
    async fn persist_schema(
        &self,
        target: &GraphTarget,
        _schema: &SchemaDoc,
    ) -> Result<(), CollabError> {
        if let Some(message) = self.state.persist_failure.lock().clone() {
            return Err(scripted_failure(message));
        }
        self.state.persisted.lock().push(target.graph.clone());
        Ok(())
    }
}

#[async_trait]
impl GraphExtractor for StubCollaborator {
    async fn process_source(
        &self,
        _target: &GraphTarget,
        source: &SourceRef,
        _key: &ApiKey,
    ) -> Result<(), CollabError> {
        let gate = self.state.source_gates.lock().get(source.as_str()).cloned();
        if let Some(gate) = gate {
            gate.wait().await;
        }

        if let Some(message) = self.state.source_failures.lock().get(source.as_str()).cloned() {
            return Err(scripted_failure(message));
        }

        self.state.processed.lock().push(source.to_string());
        Ok(())
    }
}
