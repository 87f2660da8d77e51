//! Diagram engine: pipes `.dot`/`.puml` descriptions through an external
//! renderer and captures the image it writes to stdout.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use codeloom_core::application::{RenderScope, TemplateEngine};
use codeloom_core::domain::{ArtifactContent, ArtifactDraft, TemplateInstance, TemplateOutput};

use super::{EngineError, cancelled, template_text};

const DEFAULT_FORMAT: &str = "svg";

/// Placeholder in renderer arguments replaced by the output format.
pub const FORMAT_PLACEHOLDER: &str = "{format}";

/// Runs `program args...` with the diagram on stdin. Defaults to
/// `dot -T{format}`.
#[derive(Debug, Clone)]
pub struct DiagramEngine {
    program: String,
    args: Vec<String>,
}

impl Default for DiagramEngine {
    fn default() -> Self {
        Self {
            program: "dot".to_string(),
            args: vec![format!("-T{}", FORMAT_PLACEHOLDER)],
        }
    }
}

impl DiagramEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use another renderer. `{format}` in `args` is replaced per render.
    pub fn with_command(
        program: impl Into<String>,
        args: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    async fn run(
        &self,
        input: String,
        format: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, EngineError> {
        let args: Vec<String> = self
            .args
            .iter()
            .map(|a| a.replace(FORMAT_PLACEHOLDER, format))
            .collect();
        debug!(program = %self.program, ?args, "Spawning diagram renderer");

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => EngineError::RendererMissing {
                    program: self.program.clone(),
                },
                _ => EngineError::RendererSpawn {
                    program: self.program.clone(),
                    source: e,
                },
            })?;

        let stdin = child.stdin.take();
        let feed = async move {
            if let Some(mut stdin) = stdin {
                if let Err(e) = stdin.write_all(input.as_bytes()).await {
                    debug!(error = %e, "Renderer closed stdin early");
                }
            }
        };

        let finished = async { tokio::join!(feed, child.wait_with_output()).1 };
        let output = tokio::select! {
            output = finished => output.map_err(EngineError::RendererIo)?,
            _ = cancel.cancelled() => return Err(EngineError::Cancelled),
        };

        if !output.status.success() {
            warn!(status = %output.status, "Diagram renderer exited with an error");
            return Err(EngineError::RendererExit {
                program: self.program.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output.stdout)
    }
}

#[async_trait]
impl TemplateEngine for DiagramEngine {
    fn name(&self) -> &'static str {
        "diagram"
    }

    fn extensions(&self) -> &[&'static str] {
        &["dot", "puml"]
    }

    #[instrument(skip_all, fields(template = %instance.template().id()))]
    async fn render(
        &self,
        instance: &TemplateInstance,
        _scope: &RenderScope<'_>,
        cancel: &CancellationToken,
    ) -> TemplateOutput {
        if cancel.is_cancelled() {
            return cancelled();
        }

        let template = instance.template();
        let input = match template_text(template).await {
            Ok(text) => text,
            Err(diagnostic) => return TemplateOutput::failure(diagnostic),
        };
        let format = instance.output_format().unwrap_or(DEFAULT_FORMAT);
        let file_name = instance
            .output_file_name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}.{}", template.output_stem(), format));

        match self.run(input, format, cancel).await {
            Ok(image) => TemplateOutput::success(vec![ArtifactDraft::file(
                file_name,
                ArtifactContent::Binary(image),
            )]),
            Err(error) => TemplateOutput::failure(error.into()),
        }
    }
}
