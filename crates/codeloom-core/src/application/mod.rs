//! Application layer for Codeloom.
//!
//! This layer contains:
//! - **Services**: Use case orchestration (GenerationOrchestrator, TemplateRenderer)
//! - **Generators**: Built-in reactions to artifact creation
//! - **Bus**: Typed publish/subscribe between the orchestrator and generators
//! - **Ports**: Interface definitions (traits) for external dependencies
//! - **Errors**: Application-specific error types
//!
//! Tree and template invariants live in `crate::domain`; this layer only
//! sequences them.

pub mod bus;
pub mod engine;
pub mod error;
pub mod generation;
pub mod generator;
pub mod generators;
pub mod ports;
pub mod services;

#[cfg(test)]
pub(crate) mod test_support;

pub use bus::{MessageBus, SubscriptionGuard, SubscriptionToken};
pub use engine::{EngineRegistry, RenderScope, TemplateEngine};
pub use error::ApplicationError;
pub use generation::{
    ArtifactCreated, GeneratedFile, GenerationResult, GenerationSettings, NoopProgress,
    OverwritePolicy, Progress, ProgressEvent,
};
pub use generator::{Attachment, GenerationSession, Generator, GeneratorContext, Reaction};
pub use services::{
    GenerationOrchestrator, Materializer, OrchestratorState, RunOutcome, TemplateRenderer,
    TemplateResolver,
};

// Re-export port traits (for adapter implementation)
pub use ports::{
    DefinitionSource, Filesystem, PathResolver, ProgressSink, ResolvedTemplatePath, RowSource,
    TemplateStore,
};
