//! Process-wide registry of live tasks, keyed by token.
//!
//! Shared by every request-handling and worker context, so all access goes
//! through a concurrent map. Lookups never expose a partially-constructed
//! task: tasks are fully built before registration.

use crate::error::CoreError;
use crate::source::SourceError;
use crate::task::{Task, Token};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;

/// Point-in-time task state returned by [`TaskRegistry::poll`].
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    /// Fraction of sources handled, in [0, 1].
    pub progress: f64,
    /// Sources that failed, with what their collaborator reported.
    pub errors: Vec<SourceError>,
}

/// Concurrent token → task mapping.
#[derive(Debug, Default)]
pub struct TaskRegistry {
    live: DashMap<Token, Arc<Task>>,
}

impl TaskRegistry {
    /// Create an empty registry.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a task under its token.
    ///
    /// # Errors
    /// - `CoreError::TokenCollision` if a live task already holds the token.
    ///   Tokens are 128-bit random, so in practice this path is dead; it is
    ///   an explicit rejection rather than a silent overwrite.
    pub fn register(&self, task: Arc<Task>) -> Result<(), CoreError> {
        let token = task.token();
        match self.live.entry(token) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(CoreError::TokenCollision(token)),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(task);
                tracing::debug!(%token, "task registered");
                Ok(())
            }
        }
    }

    /// Remove a task. Idempotent: removing an absent token is a no-op.
    pub fn remove(&self, token: &Token) -> Option<Arc<Task>> {
        let removed = self.live.remove(token).map(|(_, task)| task);
        if removed.is_some() {
            tracing::debug!(%token, "task removed");
        }
        removed
    }

    /// Look up a live task.
    #[must_use]
    pub fn get(&self, token: &Token) -> Option<Arc<Task>> {
        self.live.get(token).map(|entry| Arc::clone(entry.value()))
    }

    /// The polling contract: current progress for a token, with eviction on
    /// completion.
    ///
    /// When progress reaches 1.0 the task is removed as a side effect of
    /// this same call, after the value is read. Under racing pollers the
    /// caller that wins the removal is the one that receives the 1.0
    /// reading; every other (and every later) poll gets `UnknownToken`.
    /// Exactly one caller observes completion.
    ///
    /// # Errors
    /// - `CoreError::UnknownToken` if no live task holds the token.
    pub fn poll(&self, token: &Token) -> Result<StatusSnapshot, CoreError> {
        let task = self.get(token).ok_or(CoreError::UnknownToken(*token))?;
        let progress = task.progress();

        if progress >= 1.0 && self.remove(token).is_none() {
            // A racing poller evicted first and took the 1.0 reading.
            return Err(CoreError::UnknownToken(*token));
        }

        Ok(StatusSnapshot {
            progress,
            errors: task.source_errors(),
        })
    }

    /// Number of live tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.live.len()
    }

    /// Whether no tasks are live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceRef;
    use crate::task::{ApiKey, GraphTarget, Operation};

    fn registered(registry: &TaskRegistry, srcs: &[&str]) -> Arc<Task> {
        let task = Arc::new(
            Task::new(
                Operation::KgPopulate,
                srcs.iter().copied().map(SourceRef::new).collect(),
                ApiKey::new("sk-test"),
                GraphTarget::new("localhost", 6379, "movies"),
            )
            .unwrap(),
        );
        registry.register(Arc::clone(&task)).unwrap();
        task
    }

    #[test]
    fn register_and_get() {
        let registry = TaskRegistry::new();
        let task = registered(&registry, &["a"]);

        let found = registry.get(&task.token()).unwrap();
        assert_eq!(found.token(), task.token());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn register_duplicate_token_is_rejected() {
        let registry = TaskRegistry::new();
        let task = registered(&registry, &["a"]);

        let err = registry.register(Arc::clone(&task)).unwrap_err();
        assert_eq!(err, CoreError::TokenCollision(task.token()));
        // The original entry is untouched.
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn remove_is_idempotent() {
        let registry = TaskRegistry::new();
        let task = registered(&registry, &["a"]);

        assert!(registry.remove(&task.token()).is_some());
        assert!(registry.remove(&task.token()).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn poll_unknown_token() {
        let registry = TaskRegistry::new();
        let token = Token::generate();
        assert_eq!(
            registry.poll(&token).unwrap_err(),
            CoreError::UnknownToken(token)
        );
    }

    #[test]
    fn poll_evicts_on_completion_only() {
        let registry = TaskRegistry::new();
        let task = registered(&registry, &["a", "b"]);
        let token = task.token();

        assert_eq!(registry.poll(&token).unwrap().progress, 0.0);
        assert_eq!(registry.len(), 1);

        task.mark_all_processed();
        assert_eq!(registry.poll(&token).unwrap().progress, 1.0);
        assert!(registry.is_empty());

        assert_eq!(
            registry.poll(&token).unwrap_err(),
            CoreError::UnknownToken(token)
        );
    }
}
