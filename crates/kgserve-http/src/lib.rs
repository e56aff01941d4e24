//! kgserve HTTP façade
//!
//! Accepts sets of input documents, dispatches them to the schema-inference
//! and graph-extraction collaborators, and tracks asynchronous completion
//! so a client can poll for progress:
//! - `POST /detect_schema` - schema inference over the whole source set
//! - `POST /populate_kg` - per-source knowledge-graph extraction fan-out
//! - `GET /pull_status?token=` - progress polling with eviction on 1.0
//!
//! Submission returns a token promptly; the long-running collaborator calls
//! run on supervised background tasks.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod config;
pub mod dispatch;
mod handlers;
pub mod routes;

pub use config::ServerConfig;
pub use dispatch::{Collaborators, Dispatcher, FailurePolicy, TaskHandle};
pub use routes::routes;
