// ============================================================================
// domain/error.rs - TREE, DECORATOR AND TEMPLATE INVARIANTS
// ============================================================================

use thiserror::Error;

use crate::domain::artifact::{ArtifactId, ArtifactKind};

/// Root domain error type.
///
/// Every variant is an invariant violation: the operation was rejected
/// before the tree or template changed. Callers treat these as fatal.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    // ========================================================================
    // Tree structure
    // ========================================================================
    #[error("Artifact {id} does not exist in this tree")]
    ArtifactNotFound { id: ArtifactId },

    #[error("Artifact {id} already exists in this tree")]
    DuplicateArtifactId { id: ArtifactId },

    #[error("Artifact {child} is not a child of {parent}")]
    NotAChild {
        parent: ArtifactId,
        child: ArtifactId,
    },

    #[error("The root artifact cannot be removed")]
    CannotRemoveRoot,

    // ========================================================================
    // Decorators
    // ========================================================================
    #[error("Decorator '{key}' cannot be attached to a {kind} artifact")]
    DecoratorKindMismatch {
        key: &'static str,
        kind: ArtifactKind,
    },

    #[error("Artifact {artifact} already carries a '{key}' decorator")]
    DuplicateDecorator {
        key: &'static str,
        artifact: ArtifactId,
    },

    #[error("Artifact '{label}' lists more than one '{key}' decorator")]
    ConflictingDecorators { key: &'static str, label: String },

    #[error("Decorator '{key}' is detached from its artifact")]
    DecoratorDetached { key: &'static str },

    #[error("Artifact {artifact} has no '{key}' decorator")]
    DecoratorMissing {
        key: &'static str,
        artifact: ArtifactId,
    },

    // ========================================================================
    // Templates and schema
    // ========================================================================
    #[error("Invalid template id '{id}': {reason}")]
    InvalidTemplateId { id: String, reason: String },

    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    #[error("Required field missing: {field}")]
    MissingRequiredField { field: &'static str },
}

impl DomainError {
    /// Get user-actionable suggestions for fixing this error.
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            Self::DecoratorKindMismatch { key, kind } => vec![
                format!("'{}' decorators do not apply to {} artifacts", key, kind),
                "Check the generator that attached it".into(),
            ],
            Self::DecoratorDetached { key } => vec![
                format!("The '{}' decorator was removed from its artifact", key),
                "Look the decorator up again from the tree before using it".into(),
            ],
            Self::InvalidTemplateId { id, .. } => vec![
                format!("Template id: {}", id),
                "Use a plain id like 'entity-class' or '@folder/relative/path'".into(),
            ],
            Self::InvalidSchema(msg) => vec![
                "Fix the schema file and try again".into(),
                format!("Details: {}", msg),
            ],
            _ => vec!["This indicates a generator bug; see the log for details".into()],
        }
    }

    /// Error category for CLI display styling.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidTemplateId { .. }
            | Self::InvalidSchema(_)
            | Self::MissingRequiredField { .. } => ErrorCategory::Validation,
            Self::ArtifactNotFound { .. } | Self::DecoratorMissing { .. } => {
                ErrorCategory::NotFound
            }
            _ => ErrorCategory::Invariant,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Invariant,
    NotFound,
}
