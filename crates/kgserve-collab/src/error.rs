//! Error types for collaborator calls.

/// Failures reaching or reported by a collaborator.
///
/// Workers record these on the affected source records; they are never
/// thrown back into an unrelated request.
#[derive(Debug, thiserror::Error)]
pub enum CollabError {
    /// Transport-level failure talking to the collaborator.
    #[error("http transport: {0}")]
    Http(#[from] reqwest::Error),

    /// The collaborator answered with a non-success status.
    #[error("service error ({status}): {message}")]
    Service {
        /// HTTP status the collaborator returned.
        status: u16,
        /// Response body, as far as it could be read.
        message: String,
    },

    /// The collaborator answered 2xx but the body was not what the
    /// contract promises.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}
