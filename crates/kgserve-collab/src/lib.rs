//! kgserve Collaborators - the external-service boundary
//!
//! The hard parts of the system (automatic schema inference, text-to-graph
//! extraction, graph storage) are delegated to external collaborators. This
//! crate defines the seams they are reached through:
//! - [`SchemaDetector`] - one inference call over a whole source set
//! - [`GraphExtractor`] - per-source extraction against a shared graph
//! - [`GraphStore`] - persistence of a detected schema
//!
//! Two implementations ship with the crate: [`remote::RemoteCollaborator`]
//! (a GraphRAG sidecar over HTTP) and [`stub::StubCollaborator`]
//! (deterministic in-process, for tests and local development).

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod error;
pub mod remote;
pub mod schema;
pub mod stub;
mod traits;

pub use error::CollabError;
pub use remote::RemoteCollaborator;
pub use schema::SchemaDoc;
pub use stub::StubCollaborator;
pub use traits::{GraphExtractor, GraphStore, SchemaDetector};
