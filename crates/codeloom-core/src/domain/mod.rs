// ============================================================================
//  CLEAN MODULE BOUNDARIES
// ============================================================================

//! Core domain layer for codeloom.
//!
//! This module contains pure data and invariants. All I/O, templating and
//! rendering concerns are handled via ports (traits) defined in the
//! application layer.
//!
//! ## Hexagonal Architecture Compliance
//!
//! - **No async**: Domain logic is synchronous
//! - **No I/O**: No filesystem, network, or external calls
//! - **Fail fast**: Tree mutations either apply completely or return a
//!   [`DomainError`] and leave the tree untouched
pub mod artifact;
pub mod error;
pub mod naming;
pub mod rows;
pub mod schema;
pub mod template;

mod validation;

pub use artifact::{
    Artifact, ArtifactContent, ArtifactDraft, ArtifactId, ArtifactKind, ArtifactState,
    ArtifactSubtree, ArtifactTree, DatasourceBacked, Decorator, DecoratorVariant, EntityTemplate,
    FileSystemEntry, PropertyValue, TreeEvent, props,
};
pub use error::{DomainError, ErrorCategory};
pub use rows::{CellValue, Row};
pub use schema::{DataType, DomainSchema, EntityDef, PropertyDef};
pub use template::{
    ParameterDefinition, Template, TemplateDefinition, TemplateDiagnostic, TemplateId,
    TemplateInstance, TemplateOutput, TemplateSource, params,
};
pub use validation::DomainValidator;
