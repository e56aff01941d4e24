//! Error types for the task-tracking core.

use crate::task::Token;

/// Core task-tracking errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    /// A task must own at least one source.
    #[error("task has no sources")]
    NoSources,

    /// The source is not owned by the task. Internal inconsistency:
    /// well-formed callers only report back sources the task handed out.
    #[error("source not owned by task: {0}")]
    UnknownSource(String),

    /// The registry already holds a live task under this token.
    #[error("token collision: {0}")]
    TokenCollision(Token),

    /// No live task under this token.
    #[error("unknown token: {0}")]
    UnknownToken(Token),
}

impl CoreError {
    /// Client errors are reported synchronously to the caller; everything
    /// else indicates a bug or a collision that should never happen.
    #[inline]
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(self, CoreError::NoSources | CoreError::UnknownToken(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        assert_eq!(CoreError::NoSources.to_string(), "task has no sources");
        assert!(CoreError::UnknownSource("x.txt".into())
            .to_string()
            .contains("x.txt"));
    }

    #[test]
    fn client_error_classification() {
        assert!(CoreError::NoSources.is_client_error());
        assert!(CoreError::UnknownToken(Token::generate()).is_client_error());
        assert!(!CoreError::TokenCollision(Token::generate()).is_client_error());
        assert!(!CoreError::UnknownSource("x".into()).is_client_error());
    }
}
