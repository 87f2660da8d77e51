//! Application layer errors.
//!
//! These errors represent failures in orchestration, not invariants.
//! Invariant violations are `DomainError` from `crate::domain`.

use std::path::PathBuf;
use thiserror::Error;

use crate::error::ErrorCategory;

/// Errors that occur during application orchestration.
#[derive(Debug, Error, Clone)]
pub enum ApplicationError {
    /// A template id could not be turned into a template.
    #[error("Template '{id}' could not be resolved: {reason}")]
    TemplateResolution { id: String, reason: String },

    /// Template rendering failed outside the engine's own diagnostics.
    #[error("Template rendering failed: {reason}")]
    RenderingFailed { reason: String },

    /// Filesystem operation failed.
    #[error("Filesystem error at {path}: {reason}")]
    FilesystemError { path: PathBuf, reason: String },

    /// Store access failed (lock poisoned, etc.).
    #[error("Template store error")]
    StoreLockError,

    /// A generator returned a fatal error.
    #[error("Generator '{generator}' failed: {reason}")]
    GeneratorFailed { generator: String, reason: String },

    /// A generator dispatched into its own run while reacting.
    #[error("Generator '{generator}' re-entered the run while reacting")]
    ReentrantDispatch { generator: String },

    /// A bus handler failed; remaining handlers were skipped.
    #[error("Handler for {event} failed: {reason}")]
    HandlerFailed { event: &'static str, reason: String },

    /// Reading preview rows from a datasource failed.
    #[error("Datasource '{datasource}' could not be read: {reason}")]
    DataSource { datasource: String, reason: String },

    /// Validation failed (application-level, not domain).
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// The operation observed its cancellation token.
    #[error("Operation cancelled")]
    Cancelled,

    /// Rollback failed (best-effort cleanup failed).
    #[error("Rollback failed for {path}: {reason}")]
    RollbackFailed { path: PathBuf, reason: String },
}

impl ApplicationError {
    /// Get user-actionable suggestions.
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            Self::TemplateResolution { id, reason } => vec![
                format!("Template '{}': {}", id, reason),
                "Try: codeloom templates to see available templates".into(),
                "Special-folder ids look like '@templates/Models/Entity.cs.tera'".into(),
            ],
            Self::FilesystemError { path, .. } => vec![
                format!("Failed to access: {}", path.display()),
                "Check that you have write permissions".into(),
                "Ensure the parent directory exists".into(),
            ],
            Self::StoreLockError => vec![
                "The template store is locked".into(),
                "Try again in a moment".into(),
            ],
            Self::GeneratorFailed { generator, .. } => vec![
                format!("Generator '{}' aborted the run", generator),
                "Run with -vv to see the dispatch log".into(),
            ],
            Self::ReentrantDispatch { generator } => vec![
                format!("Generator '{}' published while its reaction was running", generator),
                "Return follow-up artifacts as attachments instead of publishing".into(),
            ],
            Self::DataSource { datasource, .. } => vec![
                format!("Check that datasource '{}' is reachable", datasource),
            ],
            _ => vec!["Check the error details above".into()],
        }
    }

    /// Get error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::TemplateResolution { .. } => ErrorCategory::NotFound,
            Self::FilesystemError { .. } | Self::RollbackFailed { .. } => ErrorCategory::Internal,
            Self::StoreLockError => ErrorCategory::Internal,
            Self::ValidationFailed(_) => ErrorCategory::Validation,
            Self::RenderingFailed { .. }
            | Self::GeneratorFailed { .. }
            | Self::ReentrantDispatch { .. }
            | Self::HandlerFailed { .. }
            | Self::DataSource { .. }
            | Self::Cancelled => ErrorCategory::Internal,
        }
    }
}
