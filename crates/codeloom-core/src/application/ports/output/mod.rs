//! Driven (output) ports - implemented by infrastructure.
//!
//! These traits define what the application needs from external systems.
//! The `codeloom-adapters` crate provides implementations.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

use crate::application::generation::ProgressEvent;
use crate::domain::{Row, Template, TemplateDefinition, TemplateId};
use crate::error::CodeloomResult;

/// Port for filesystem operations.
///
/// Implemented by:
/// - `codeloom_adapters::filesystem::LocalFilesystem` (production)
/// - `codeloom_adapters::filesystem::MemoryFilesystem` (testing)
///
/// Only the materializer holds one; generators never see it.
#[cfg_attr(test, mockall::automock)]
pub trait Filesystem: Send + Sync {
    /// Create a directory and all parent directories.
    fn create_dir_all(&self, path: &Path) -> CodeloomResult<()>;

    /// Write content to a file, replacing it if present.
    fn write_file(&self, path: &Path, content: &[u8]) -> CodeloomResult<()>;

    /// Read a whole file.
    fn read_file(&self, path: &Path) -> CodeloomResult<Vec<u8>>;

    /// Copy a file verbatim.
    fn copy_file(&self, from: &Path, to: &Path) -> CodeloomResult<()>;

    /// Check if path exists.
    fn exists(&self, path: &Path) -> bool;

    /// Remove a single file.
    fn remove_file(&self, path: &Path) -> CodeloomResult<()>;

    /// Remove a directory and all contents.
    fn remove_dir_all(&self, path: &Path) -> CodeloomResult<()>;
}

/// Port for template storage and retrieval by plain id.
///
/// Implemented by:
/// - `codeloom_adapters::template_store::InMemoryStore` (built-in templates)
pub trait TemplateStore: Send + Sync {
    /// Get a specific template by ID.
    fn get(&self, id: &TemplateId) -> CodeloomResult<Template>;

    /// List all available templates.
    fn list(&self) -> CodeloomResult<Vec<Template>>;

    /// Insert or update a template.
    fn insert(&self, template: Template) -> CodeloomResult<()>;

    /// Remove a template.
    fn remove(&self, id: &TemplateId) -> CodeloomResult<()>;
}

/// What a special-folder path points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedTemplatePath {
    File(PathBuf),
    Folder(PathBuf),
}

impl ResolvedTemplatePath {
    pub fn path(&self) -> &Path {
        match self {
            Self::File(p) | Self::Folder(p) => p,
        }
    }
}

/// Port mapping `@folder/relative/path` ids to concrete locations.
///
/// Implemented by `codeloom_adapters::resolver::FsPathResolver`.
pub trait PathResolver: Send + Sync {
    fn resolve(&self, folder: &str, relative: &str) -> CodeloomResult<ResolvedTemplatePath>;

    /// Names of the special folders this resolver knows.
    fn folders(&self) -> Vec<String>;
}

/// Port looking up parameter definitions for file-backed templates.
///
/// Implemented by `codeloom_adapters::template_loader::DefinitionLoader`,
/// which reads a `.params.toml` file next to the template.
pub trait DefinitionSource: Send + Sync {
    fn definition_for(&self, template_path: &Path) -> CodeloomResult<Option<TemplateDefinition>>;
}

/// Port for reading preview rows out of a rectangular datasource.
#[async_trait]
pub trait RowSource: Send + Sync {
    async fn read_rows(
        &self,
        datasource: &str,
        table: &str,
        filter: Option<&str>,
        max_rows: usize,
        cancel: &CancellationToken,
    ) -> CodeloomResult<Vec<Row>>;
}

/// Port receiving progress notifications; events are relayed as-is.
pub trait ProgressSink: Send + Sync {
    fn report(&self, event: ProgressEvent);
}
