//! Server configuration.

use crate::dispatch::FailurePolicy;
use std::net::SocketAddr;
use std::time::Duration;

/// kgserve server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the HTTP server binds to.
    pub bind: SocketAddr,
    /// How collaborator failures are reflected in task state.
    pub failure_policy: FailurePolicy,
    /// Abort a task's outstanding work after this long. `None` matches the
    /// legacy run-to-completion-or-hang behavior.
    pub task_timeout: Option<Duration>,
}

impl ServerConfig {
    /// Create the default configuration.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With bind address.
    #[inline]
    #[must_use]
    pub fn with_bind(mut self, bind: SocketAddr) -> Self {
        self.bind = bind;
        self
    }

    /// With failure policy.
    #[inline]
    #[must_use]
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// With per-task timeout.
    #[inline]
    #[must_use]
    pub fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = Some(timeout);
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: ([127, 0, 0, 1], 5000).into(),
            failure_policy: FailurePolicy::MarkErrored,
            task_timeout: None,
        }
    }
}
