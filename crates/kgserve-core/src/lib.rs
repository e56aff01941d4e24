//! kgserve Core - asynchronous task tracking
//!
//! The concurrent job registry behind the kgserve HTTP façade:
//! - Issues unique tokens for long-running operations
//! - Records per-source completion status safely under concurrent writes
//! - Reports race-free completion fractions to polling clients
//! - Evicts completed tasks exactly once
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use kgserve_core::{
//!     ApiKey, GraphTarget, Operation, SourceRef, SourceStatus, Task, TaskRegistry,
//! };
//!
//! # fn example() -> Result<(), kgserve_core::CoreError> {
//! let registry = TaskRegistry::new();
//!
//! let task = Arc::new(Task::new(
//!     Operation::KgPopulate,
//!     vec![SourceRef::new("doc1.txt"), SourceRef::new("doc2.txt")],
//!     ApiKey::new("sk-test"),
//!     GraphTarget::new("localhost", 6379, "movies"),
//! )?);
//! let token = task.token();
//! registry.register(Arc::clone(&task))?;
//!
//! task.update_source_status(&SourceRef::new("doc1.txt"), SourceStatus::Processed)?;
//! assert_eq!(registry.poll(&token)?.progress, 0.5);
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

// Core modules
pub mod error;
pub mod registry;
pub mod source;
pub mod task;

// Re-exports for convenience
pub use error::CoreError;
pub use registry::{StatusSnapshot, TaskRegistry};
pub use source::{SourceError, SourceRecord, SourceRef, SourceStatus};
pub use task::{ApiKey, GraphTarget, Operation, Task, Token};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
