//! Collaborator traits.
//!
//! Each trait is a long-running blocking call from the calling worker's
//! point of view and must run off the request-handling path. The credential
//! travels as an explicit argument on every call, never as ambient process
//! state.

use crate::error::CollabError;
use crate::schema::SchemaDoc;
use async_trait::async_trait;
use kgserve_core::{ApiKey, GraphTarget, SourceRef};

/// Automatic schema inference over a whole source set.
#[async_trait]
pub trait SchemaDetector: Send + Sync {
    /// Detect a schema from the entire source set in one call. There is no
    /// per-source granularity: the call either yields a schema for all of
    /// them or fails as a unit.
    async fn auto_detect(
        &self,
        sources: &[SourceRef],
        key: &ApiKey,
    ) -> Result<SchemaDoc, CollabError>;
}

/// Persistence of a detected schema into the external graph store.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Select or create the named graph at the target and save the schema
    /// into it. Contents are not interpreted on this side of the seam.
    async fn persist_schema(
        &self,
        target: &GraphTarget,
        schema: &SchemaDoc,
    ) -> Result<(), CollabError>;
}

/// Text-to-graph extraction of a single source.
#[async_trait]
pub trait GraphExtractor: Send + Sync {
    /// Extract one source and store the result into the shared graph at the
    /// target. Safe to call concurrently for distinct sources of the same
    /// task; no ordering between concurrent calls is assumed.
    async fn process_source(
        &self,
        target: &GraphTarget,
        source: &SourceRef,
        key: &ApiKey,
    ) -> Result<(), CollabError>;
}
