//! Infrastructure adapters for codeloom.
//!
//! This crate implements the ports defined in `codeloom-core::application::ports`
//! and the template engines. It contains all external dependencies and I/O
//! operations.

pub mod builtin_templates;
pub mod engines;
pub mod filesystem;
pub mod resolver;
pub mod rows;
pub mod template_loader;
pub mod template_store;

use std::sync::Arc;

use codeloom_core::application::{EngineRegistry, TemplateRenderer, TemplateResolver};
use codeloom_core::error::CodeloomResult;

// Re-export commonly used adapters
pub use engines::{
    DiagramEngine, EngineError, FileOverride, FolderEngine, LegacyEngine, ScriptEngine,
};
pub use filesystem::{LocalFilesystem, MemoryFilesystem};
pub use resolver::{FsPathResolver, MissingFilePolicy};
pub use rows::InMemoryRowSource;
pub use template_loader::DefinitionLoader;
pub use template_store::InMemoryStore;

/// Registry with every bundled engine: tera scripts, legacy `.tpl`
/// preprocessing, diagrams and the folder aggregator.
pub fn default_engines() -> EngineRegistry {
    EngineRegistry::new()
        .with(Arc::new(ScriptEngine::new()))
        .with(Arc::new(LegacyEngine::new()))
        .with(Arc::new(DiagramEngine::new()))
        .with_folder(Arc::new(FolderEngine::new()))
}

/// Renderer wired with the built-in store, the given special folders and
/// every bundled engine.
pub fn default_renderer(paths: Option<FsPathResolver>) -> CodeloomResult<TemplateRenderer> {
    build_renderer(default_engines(), paths)
}

/// Renderer over the built-in store with a caller-configured engine set.
pub fn build_renderer(
    engines: EngineRegistry,
    paths: Option<FsPathResolver>,
) -> CodeloomResult<TemplateRenderer> {
    let store = InMemoryStore::with_builtin()?;
    let mut resolver = TemplateResolver::new(Arc::new(store));
    if let Some(paths) = paths {
        resolver = resolver.with_paths(Arc::new(paths));
    }
    Ok(TemplateRenderer::new(resolver, engines).with_definitions(Arc::new(DefinitionLoader::new())))
}
