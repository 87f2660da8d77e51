//! Codeloom Core - schema-driven code generation engine.
//!
//! This crate provides the domain and application layers of codeloom,
//! following hexagonal (ports and adapters) architecture.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │          codeloom-cli (CLI)             │
//! └──────────────────┬──────────────────────┘
//!                    │ calls
//!                    ▼
//! ┌─────────────────────────────────────────┐
//! │         Application Services            │
//! │ (GenerationOrchestrator, Materializer,  │
//! │  TemplateRenderer, MessageBus)          │
//! └──────────────────┬──────────────────────┘
//!                    │ uses
//!                    ▼
//! ┌─────────────────────────────────────────┐
//! │      Application Ports (Traits)         │
//! │ (Filesystem, TemplateStore, PathResolver│
//! │  RowSource, ProgressSink, TemplateEngine│
//! └──────────────────┬──────────────────────┘
//!                    │ implemented by
//!                    ▼
//! ┌─────────────────────────────────────────┐
//! │     codeloom-adapters (Infrastructure)  │
//! └─────────────────────────────────────────┘
//!
//! ┌─────────────────────────────────────────┐
//! │         Domain Layer (Pure Logic)       │
//! │ (ArtifactTree, Decorator, ArtifactState │
//! │  DomainSchema, Template, TemplateId)    │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use codeloom_core::prelude::*;
//! # async fn run(renderer: Arc<TemplateRenderer>, fs: Arc<dyn Filesystem>, schema: DomainSchema) {
//! let mut orchestrator = GenerationOrchestrator::new(renderer, fs);
//! orchestrator.initialize(codeloom_core::application::generators::builtin());
//!
//! let result = orchestrator
//!     .preview(schema, GenerationSettings::default(), Arc::new(NoopProgress), CancellationToken::new())
//!     .await;
//! assert!(result.is_success());
//! # }
//! ```

pub mod application;
pub mod domain;
pub mod error;

pub use tokio_util::sync::CancellationToken;

/// Public API - what external crates should use.
pub mod prelude {
    pub use crate::application::{
        ArtifactCreated, EngineRegistry, GeneratedFile, GenerationOrchestrator,
        GenerationResult, GenerationSettings, Generator, GeneratorContext, Materializer,
        MessageBus, NoopProgress, OverwritePolicy, Progress, ProgressEvent, Reaction,
        RenderScope, SubscriptionToken, TemplateEngine, TemplateRenderer, TemplateResolver,
        ports::{Filesystem, PathResolver, ProgressSink, RowSource, TemplateStore},
    };
    pub use crate::domain::{
        Artifact, ArtifactContent, ArtifactDraft, ArtifactId, ArtifactKind, ArtifactState,
        ArtifactTree, DataType, Decorator, DomainSchema, EntityDef, PropertyDef, PropertyValue,
        Template, TemplateDiagnostic, TemplateId, TemplateInstance, TemplateOutput,
        TemplateSource,
    };
    pub use crate::error::{CodeloomError, CodeloomResult};
    pub use tokio_util::sync::CancellationToken;
}

/// Crate version, reported by the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
