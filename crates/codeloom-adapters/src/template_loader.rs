//! Filesystem-based template discovery and definition loading.
//!
//! A template file may carry a sibling definition file declaring the
//! parameters it expects. The definition file is named after the full
//! template file name plus `.params.toml`:
//!
//! ```text
//! templates/
//! ├── Models/
//! │   ├── Entity.cs.tera
//! │   └── Entity.cs.tera.params.toml   ← optional definition
//! └── web/                              ← folder template
//!     ├── Program.cs.tera
//!     └── appsettings.json
//! ```
//!
//! # `.params.toml` format
//!
//! ```toml
//! description = "C# class per entity"   # optional
//!
//! [[parameters]]
//! name        = "entity"
//! type        = "string"                # string | number | bool | array | object | any
//! description = "Class name"            # optional
//! required    = true                    # optional, defaults to false
//! ```
//!
//! Definitions only feed warnings; a broken definition file never stops a
//! template from rendering.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, instrument, warn};
use walkdir::WalkDir;

use codeloom_core::{
    application::{ApplicationError, EngineRegistry, ports::DefinitionSource},
    domain::{Template, TemplateDefinition, TemplateId},
    error::CodeloomResult,
};

/// Suffix of template definition files.
pub const DEFINITION_SUFFIX: &str = ".params.toml";

/// Path of the definition file belonging to `template_path`.
pub fn definition_path(template_path: &Path) -> PathBuf {
    let mut name: OsString = template_path.as_os_str().to_owned();
    name.push(DEFINITION_SUFFIX);
    PathBuf::from(name)
}

/// Whether `path` is a definition file rather than a template.
pub fn is_definition_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(DEFINITION_SUFFIX))
}

/// Reads `.params.toml` definitions next to template files.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefinitionLoader;

impl DefinitionLoader {
    pub fn new() -> Self {
        Self
    }

    /// Parse a definition file's text.
    pub fn parse(path: &Path, raw: &str) -> CodeloomResult<TemplateDefinition> {
        toml::from_str(raw).map_err(|e| {
            ApplicationError::ValidationFailed(format!(
                "failed to parse '{}': {}",
                path.display(),
                e
            ))
            .into()
        })
    }
}

impl DefinitionSource for DefinitionLoader {
    #[instrument(skip(self), fields(template = %template_path.display()))]
    fn definition_for(&self, template_path: &Path) -> CodeloomResult<Option<TemplateDefinition>> {
        let path = definition_path(template_path);
        if !path.is_file() {
            return Ok(None);
        }

        let raw = fs::read_to_string(&path).map_err(|e| ApplicationError::FilesystemError {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        let definition = Self::parse(&path, &raw)?;
        debug!(parameters = definition.parameters.len(), "Loaded template definition");
        Ok(Some(definition))
    }
}

/// Lists the file templates under a special folder directory as
/// `@folder/relative` templates.
///
/// Only files whose extension has a registered engine are listed; definition
/// files and unreadable entries are skipped with a warning.
#[instrument(skip(engines), fields(dir = %dir.display()))]
pub fn scan_folder(folder: &str, dir: &Path, engines: &EngineRegistry) -> Vec<Template> {
    let loader = DefinitionLoader::new();
    let mut templates = Vec::new();

    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "skipping unreadable template entry");
                continue;
            }
        };
        let path = entry.path();
        if !entry.file_type().is_file() || is_definition_file(path) {
            continue;
        }
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            continue;
        };
        if !engines.handles(ext) {
            continue;
        }

        let Ok(relative) = path.strip_prefix(dir) else {
            continue;
        };
        let relative = relative.to_string_lossy().replace('\\', "/");
        let id = match TemplateId::parse(&format!("@{}/{}", folder, relative)) {
            Ok(id) => id,
            Err(e) => {
                warn!(error = %e, "skipping template with unusable path");
                continue;
            }
        };

        let mut template = Template::file(id, path);
        match loader.definition_for(path) {
            Ok(Some(definition)) => {
                if let Some(description) = definition.description.clone() {
                    template = template.with_description(description);
                }
                template = template.with_definition(definition);
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "ignoring broken template definition"),
        }
        templates.push(template);
    }

    debug!(count = templates.len(), "finished scanning template folder");
    templates
}
