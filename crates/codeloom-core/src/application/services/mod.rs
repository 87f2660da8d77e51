//! Application services - orchestrate use cases.
//!
//! Services coordinate the domain layer and ports to accomplish
//! high-level use cases like "generate a schema" or "render a template".

pub mod materializer;
pub mod orchestrator;
mod preview;
pub mod template_service;

pub use materializer::Materializer;
pub use orchestrator::{GenerationOrchestrator, OrchestratorState, RunOutcome};
pub use template_service::{TemplateRenderer, TemplateResolver};
