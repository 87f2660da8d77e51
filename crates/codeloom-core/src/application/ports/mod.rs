//! Application ports (traits) for external dependencies.
//!
//! In hexagonal architecture, ports define interfaces that the application
//! needs from the outside world. Adapters in `codeloom-adapters` implement these.
//!
//! ## Port Types
//!
//! - **Driven (Output) Ports**: Called by application, implemented by infrastructure
//!   - `Filesystem`: File operations (materializer only)
//!   - `TemplateStore`: Plain-id template storage/retrieval
//!   - `PathResolver`: Special-folder template paths
//!   - `DefinitionSource`: Parameter definitions for file templates
//!   - `RowSource`: Datasource preview rows
//!   - `ProgressSink`: Progress notifications
//!
//! Template engines are a port as well; see [`crate::application::TemplateEngine`].

pub mod output;

pub use output::{
    DefinitionSource, Filesystem, PathResolver, ProgressSink, ResolvedTemplatePath, RowSource,
    TemplateStore,
};

#[cfg(test)]
pub use output::MockFilesystem;
