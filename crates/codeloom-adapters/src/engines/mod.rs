//! Template engines.
//!
//! Every engine implements [`codeloom_core::application::TemplateEngine`]
//! and reports expected problems as [`TemplateOutput::Failure`] values.

mod diagram;
mod folder;
mod legacy;
mod script;

pub use diagram::DiagramEngine;
pub use folder::{DEFAULT_EXCLUSIONS, FileOverride, FolderEngine};
pub use legacy::LegacyEngine;
pub use script::ScriptEngine;

use std::process::ExitStatus;

use thiserror::Error;

use codeloom_core::domain::{
    ArtifactContent, ArtifactDraft, Template, TemplateDiagnostic, TemplateInstance, TemplateOutput,
    TemplateSource,
};

/// Longest chain of nested template references an engine follows.
pub(crate) const MAX_INCLUDE_DEPTH: usize = 16;

/// Engine-side failures. They never leave an engine as `Err`: each one is
/// turned into a [`TemplateDiagnostic`] on the way out.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("cannot include '{id}': {reason}")]
    Include { id: String, reason: String },

    #[error("includes nested deeper than {limit} levels at '{id}'")]
    IncludeDepth { id: String, limit: usize },

    #[error("diagram renderer '{program}' is not available; install it or configure another")]
    RendererMissing { program: String },

    #[error("cannot start diagram renderer '{program}': {source}")]
    RendererSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("diagram renderer failed: {0}")]
    RendererIo(#[source] std::io::Error),

    #[error("diagram renderer '{program}' exited with {status}: {stderr}")]
    RendererExit {
        program: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("rendering cancelled")]
    Cancelled,
}

impl From<EngineError> for TemplateDiagnostic {
    fn from(error: EngineError) -> Self {
        TemplateDiagnostic::new(error.to_string())
    }
}

/// Template text, read from disk for file templates.
pub(crate) async fn template_text(template: &Template) -> Result<String, TemplateDiagnostic> {
    match template.source() {
        TemplateSource::Static(text) => Ok((*text).to_string()),
        TemplateSource::Owned(text) => Ok(text.clone()),
        TemplateSource::File(path) => tokio::fs::read_to_string(path).await.map_err(|e| {
            TemplateDiagnostic::new(format!("cannot read template: {}", e))
                .in_path(path.display().to_string())
        }),
        TemplateSource::Folder(path) => Err(TemplateDiagnostic::new(format!(
            "template '{}' is a folder, not a file",
            template.id()
        ))
        .in_path(path.display().to_string())),
    }
}

/// Wrap rendered text as a single file named after the instance. Blank
/// output produces no artifact.
pub(crate) fn text_output(instance: &TemplateInstance, text: String) -> TemplateOutput {
    if text.trim().is_empty() {
        return TemplateOutput::success(Vec::new());
    }
    TemplateOutput::success(vec![ArtifactDraft::file(
        instance.resolved_file_name(),
        ArtifactContent::Text(text),
    )])
}

pub(crate) fn cancelled() -> TemplateOutput {
    TemplateOutput::failure_message("rendering cancelled")
}
