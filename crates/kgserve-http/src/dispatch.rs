//! Worker dispatch: supervised background execution per task.
//!
//! Schema detection runs as one unit over the whole source set; population
//! fans out one unit per source. Either way the submitting request only
//! registers the task and spawns the supervisor, so token issuance returns
//! promptly. Completion feeds back into the task's own source records,
//! which is all a status poll ever reads.

use dashmap::DashMap;
use kgserve_collab::{CollabError, GraphExtractor, GraphStore, SchemaDetector};
use kgserve_core::{ApiKey, CoreError, GraphTarget, Operation, SourceRef, SourceStatus, Task, TaskRegistry, Token};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinError, JoinHandle, JoinSet};

/// How a collaborator failure is reflected in task state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Mark the affected source record(s) `Errored` and capture the error
    /// for retrieval through status polling.
    #[default]
    MarkErrored,
    /// Reproduce the legacy behavior: log only, leave the records
    /// `Unhandled`, and let the task stall below 1.0 forever. Kept for
    /// compatibility testing.
    LegacyStall,
}

/// Shared collaborator handles for a dispatcher.
#[derive(Clone)]
pub struct Collaborators {
    /// Schema inference over whole source sets.
    pub detector: Arc<dyn SchemaDetector>,
    /// Schema persistence into the graph store.
    pub store: Arc<dyn GraphStore>,
    /// Per-source knowledge-graph extraction.
    pub extractor: Arc<dyn GraphExtractor>,
}

impl Collaborators {
    /// Use one implementation for all three seams.
    #[must_use]
    pub fn from_single<C>(collaborator: Arc<C>) -> Self
    where
        C: SchemaDetector + GraphStore + GraphExtractor + 'static,
    {
        Self {
            detector: Arc::clone(&collaborator) as Arc<dyn SchemaDetector>,
            store: Arc::clone(&collaborator) as Arc<dyn GraphStore>,
            extractor: collaborator as Arc<dyn GraphExtractor>,
        }
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

/// Supervision handle for one task's background work.
///
/// Retained by the dispatcher so running work can be awaited or aborted,
/// rather than fired off as an unmanaged detached thread.
#[derive(Debug)]
pub struct TaskHandle {
    token: Token,
    handle: JoinHandle<()>,
}

impl TaskHandle {
    /// Token of the supervised task.
    #[inline]
    #[must_use]
    pub fn token(&self) -> Token {
        self.token
    }

    /// Whether the supervisor has finished.
    #[inline]
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Abort the supervisor (and, through it, any outstanding units).
    pub fn abort(&self) {
        self.handle.abort();
    }

    /// Wait for the supervisor to finish.
    ///
    /// # Errors
    /// Returns the join error if the supervisor panicked or was aborted.
    pub async fn join(self) -> Result<(), JoinError> {
        self.handle.await
    }
}

/// Launches and supervises background work for submitted tasks.
#[derive(Debug)]
pub struct Dispatcher {
    registry: Arc<TaskRegistry>,
    collaborators: Collaborators,
    policy: FailurePolicy,
    timeout: Option<Duration>,
    handles: DashMap<Token, TaskHandle>,
}

impl Dispatcher {
    /// Create a dispatcher with the default failure policy and no timeout.
    #[must_use]
    pub fn new(registry: Arc<TaskRegistry>, collaborators: Collaborators) -> Self {
        Self {
            registry,
            collaborators,
            policy: FailurePolicy::default(),
            timeout: None,
            handles: DashMap::new(),
        }
    }

    /// With failure policy.
    #[inline]
    #[must_use]
    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// With per-task timeout.
    #[inline]
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The registry status polls read from.
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    /// Create a task, register it and launch its background work.
    ///
    /// Returns the token synchronously; the workers have not necessarily
    /// started when this returns.
    ///
    /// # Errors
    /// - `CoreError::NoSources` for an empty source list.
    /// - `CoreError::TokenCollision` if the fresh token is already live.
    pub fn submit(
        &self,
        operation: Operation,
        sources: Vec<SourceRef>,
        credential: ApiKey,
        target: GraphTarget,
    ) -> Result<Token, CoreError> {
        let task = Arc::new(Task::new(operation, sources, credential, target)?);
        self.registry.register(Arc::clone(&task))?;
        let token = task.token();

        let handle = match operation {
            Operation::SchemaDetection => self.spawn_schema_detection(task),
            Operation::KgPopulate => self.spawn_population(task),
        };
        self.handles.insert(token, handle);

        tracing::info!(%token, ?operation, "task submitted");
        Ok(token)
    }

    /// Launch schema detection for a task: one unit over the whole set.
    pub fn spawn_schema_detection(&self, task: Arc<Task>) -> TaskHandle {
        let collaborators = self.collaborators.clone();
        let policy = self.policy;
        let limit = self.timeout;
        let token = task.token();

        let handle = tokio::spawn(async move {
            let work = run_schema_detection(Arc::clone(&task), collaborators, policy);
            match limit {
                Some(limit) => {
                    if tokio::time::timeout(limit, work).await.is_err() {
                        on_timeout(&task, policy, limit);
                    }
                }
                None => work.await,
            }
        });

        TaskHandle { token, handle }
    }

    /// Launch population for a task: one concurrent unit per source.
    pub fn spawn_population(&self, task: Arc<Task>) -> TaskHandle {
        let collaborators = self.collaborators.clone();
        let policy = self.policy;
        let limit = self.timeout;
        let token = task.token();

        let handle = tokio::spawn(async move {
            let mut units: JoinSet<()> = JoinSet::new();
            for source in task.source_refs() {
                units.spawn(run_population_unit(
                    Arc::clone(&task),
                    collaborators.clone(),
                    policy,
                    source,
                ));
            }

            match limit {
                Some(limit) => {
                    if tokio::time::timeout(limit, drain_units(&mut units, token))
                        .await
                        .is_err()
                    {
                        units.abort_all();
                        on_timeout(&task, policy, limit);
                    }
                }
                None => drain_units(&mut units, token).await,
            }
        });

        TaskHandle { token, handle }
    }

    /// Take ownership of a task's supervision handle.
    pub fn take_handle(&self, token: &Token) -> Option<TaskHandle> {
        self.handles.remove(token).map(|(_, handle)| handle)
    }

    /// Abort a task's background work. Returns whether a handle was live.
    pub fn abort(&self, token: &Token) -> bool {
        match self.handles.remove(token) {
            Some((_, handle)) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    /// Drop the finished supervision handle of an evicted task.
    pub(crate) fn discard_handle(&self, token: &Token) {
        self.handles.remove(token);
    }
}

async fn drain_units(units: &mut JoinSet<()>, token: Token) {
    while let Some(joined) = units.join_next().await {
        if let Err(err) = joined {
            tracing::error!(%token, error = %err, "population unit panicked");
        }
    }
}

fn on_timeout(task: &Task, policy: FailurePolicy, limit: Duration) {
    tracing::warn!(token = %task.token(), ?limit, "task timed out");
    if policy == FailurePolicy::MarkErrored {
        task.mark_unhandled_errored("timed out");
    }
}

/// Detect a schema over the entire source set, persist it, then mark every
/// source processed at once. Progress jumps 0 -> 1 and reads 1.0 only once
/// the schema is actually in the store.
async fn run_schema_detection(task: Arc<Task>, collaborators: Collaborators, policy: FailurePolicy) {
    let token = task.token();
    tracing::debug!(%token, "running schema detection");

    let result: Result<(), CollabError> = async {
        let schema = collaborators
            .detector
            .auto_detect(&task.source_refs(), task.credential())
            .await?;
        collaborators
            .store
            .persist_schema(&task.target().schema_target(), &schema)
            .await?;
        Ok(())
    }
    .await;

    match result {
        Ok(()) => {
            task.mark_all_processed();
            tracing::info!(%token, "schema detection done");
        }
        Err(err) => match policy {
            FailurePolicy::MarkErrored => {
                tracing::error!(%token, error = %err, "schema detection failed");
                // Detection is one atomic call, so its failure errors the
                // whole set, mirroring how its success processes it.
                task.mark_unhandled_errored(&err.to_string());
            }
            FailurePolicy::LegacyStall => {
                tracing::error!(%token, error = %err, "schema detection failed; task left stalled");
            }
        },
    }
}

/// Extract one source; each unit updates only its own record.
async fn run_population_unit(
    task: Arc<Task>,
    collaborators: Collaborators,
    policy: FailurePolicy,
    source: SourceRef,
) {
    let token = task.token();

    match collaborators
        .extractor
        .process_source(task.target(), &source, task.credential())
        .await
    {
        Ok(()) => {
            if let Err(err) = task.update_source_status(&source, SourceStatus::Processed) {
                tracing::error!(%token, %source, error = %err, "completion for unowned source");
            }
        }
        Err(err) => match policy {
            FailurePolicy::MarkErrored => {
                tracing::warn!(%token, %source, error = %err, "source extraction failed");
                if let Err(err) = task.record_source_error(&source, err.to_string()) {
                    tracing::error!(%token, %source, error = %err, "failure for unowned source");
                }
            }
            FailurePolicy::LegacyStall => {
                tracing::warn!(%token, %source, error = %err, "source extraction failed; record left unhandled");
            }
        },
    }
}
