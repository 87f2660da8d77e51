//! Unified error handling for Codeloom Core.
//!
//! This module provides a unified error type that wraps domain and application
//! errors, with rich context and user-actionable suggestions.

use thiserror::Error;

use crate::application::ApplicationError;
use crate::domain::DomainError;

/// Root error type for Codeloom Core operations.
#[derive(Debug, Error, Clone)]
pub enum CodeloomError {
    /// Errors from the domain layer (tree and template invariants).
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// Errors from the application layer (orchestration failures).
    #[error("Application error: {0}")]
    Application(#[from] ApplicationError),

    /// Configuration or setup errors.
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Unexpected internal errors (bugs).
    #[error("Internal error: {message}. This is a bug, please report it.")]
    Internal { message: String },
}

impl CodeloomError {
    /// Get user-actionable suggestions for fixing this error.
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Domain(e) => e.suggestions(),
            Self::Application(e) => e.suggestions(),
            Self::Configuration { message } => vec![
                format!("Configuration issue: {}", message),
                "Check your setup and try again".into(),
            ],
            Self::Internal { .. } => vec![
                "This appears to be a bug in codeloom".into(),
                "Please report this issue at: https://github.com/codeloom/codeloom/issues".into(),
            ],
        }
    }

    /// Get error category for display/styling purposes.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Domain(e) => match e.category() {
                crate::domain::ErrorCategory::Validation => ErrorCategory::Validation,
                crate::domain::ErrorCategory::Invariant => ErrorCategory::Invariant,
                crate::domain::ErrorCategory::NotFound => ErrorCategory::NotFound,
            },
            Self::Application(e) => e.category(),
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Application(ApplicationError::StoreLockError))
    }

    /// Whether this error is a cooperative cancellation rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Application(ApplicationError::Cancelled))
    }
}

/// Error categories for UI display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Invariant,
    NotFound,
    Configuration,
    Internal,
}

/// Convenient result type alias.
pub type CodeloomResult<T> = Result<T, CodeloomError>;

/// Extension trait for adding context to errors.
pub trait Context<T> {
    /// Add context to an error.
    fn context(self, msg: impl Into<String>) -> CodeloomResult<T>;
}

impl<T, E> Context<T> for Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context(self, msg: impl Into<String>) -> CodeloomResult<T> {
        self.map_err(|e| CodeloomError::Internal {
            message: format!("{}: {}", msg.into(), e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ArtifactId, ArtifactKind};

    #[test]
    fn domain_errors_keep_their_category() {
        let err: CodeloomError = DomainError::DecoratorKindMismatch {
            key: "datasource-backed",
            kind: ArtifactKind::Folder,
        }
        .into();
        assert_eq!(err.category(), ErrorCategory::Invariant);

        let err: CodeloomError = DomainError::ArtifactNotFound {
            id: ArtifactId::new(),
        }
        .into();
        assert_eq!(err.category(), ErrorCategory::NotFound);
    }

    #[test]
    fn context_wraps_foreign_errors_as_internal() {
        let raw: Result<(), std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::Other, "boom"));
        let err = raw.context("reading schema").unwrap_err();
        assert!(matches!(err, CodeloomError::Internal { .. }));
        assert!(err.to_string().contains("reading schema: boom"));
    }

    #[test]
    fn cancellation_is_not_retryable() {
        let err: CodeloomError = ApplicationError::Cancelled.into();
        assert!(err.is_cancelled());
        assert!(!err.is_retryable());
    }
}
