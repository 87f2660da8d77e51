//! Run inputs and outputs: settings, the bus event, progress and results.

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::application::ports::ProgressSink;
use crate::domain::{ArtifactId, ArtifactKind};

// ── Bus event ────────────────────────────────────────────────────────────────

/// Published on the bus for every artifact added to the run's tree, in the
/// order the tree raised them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactCreated {
    pub artifact: ArtifactId,
    pub parent: Option<ArtifactId>,
    pub kind: ArtifactKind,
    pub label: String,
}

// ── Settings ─────────────────────────────────────────────────────────────────

/// What to do when a generated file already exists on disk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverwritePolicy {
    /// Keep existing files and report a warning.
    Never,
    #[default]
    Always,
    /// Only write when the content differs.
    IfChanged,
}

impl fmt::Display for OverwritePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Never => "never",
            Self::Always => "always",
            Self::IfChanged => "if-changed",
        })
    }
}

impl std::str::FromStr for OverwritePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "never" => Ok(Self::Never),
            "always" => Ok(Self::Always),
            "if-changed" | "ifchanged" | "changed" => Ok(Self::IfChanged),
            other => Err(format!(
                "unknown overwrite policy '{}' (expected never, always or if-changed)",
                other
            )),
        }
    }
}

/// Per-run settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    /// Directory the project folder is written into.
    pub output_dir: PathBuf,
    /// Namespace for generated code; falls back to the schema's, then its name.
    pub namespace: Option<String>,
    pub overwrite: OverwritePolicy,
    /// Template folder (`@folder/relative`) rendered into every project.
    pub project_template: Option<String>,
    /// Template used for entities that do not name one.
    pub entity_template: String,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            namespace: None,
            overwrite: OverwritePolicy::default(),
            project_template: None,
            entity_template: "entity-class".to_string(),
        }
    }
}

// ── Progress ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Progress {
    Indeterminate,
    Percent(u8),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressEvent {
    pub step: String,
    pub message: String,
    pub progress: Progress,
}

impl ProgressEvent {
    pub fn indeterminate(step: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            message: message.into(),
            progress: Progress::Indeterminate,
        }
    }

    pub fn percent(step: impl Into<String>, message: impl Into<String>, percent: u8) -> Self {
        Self {
            step: step.into(),
            message: message.into(),
            progress: Progress::Percent(percent.min(100)),
        }
    }
}

/// Sink that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn report(&self, _event: ProgressEvent) {}
}

// ── Result ───────────────────────────────────────────────────────────────────

/// A file the run produced, recorded when its artifact was added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedFile {
    pub artifact: ArtifactId,
    /// Path relative to the output directory, starting at the project folder.
    pub path: PathBuf,
    pub kind: ArtifactKind,
    /// Content size in bytes; `None` for passthrough copies.
    pub size: Option<usize>,
}

/// Single sink for everything a run reports. Entries keep insertion order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GenerationResult {
    files: Vec<GeneratedFile>,
    warnings: Vec<String>,
    errors: Vec<String>,
    #[serde(rename = "elapsed_ms", serialize_with = "as_millis")]
    elapsed: Duration,
    cancelled: Option<String>,
    fatal: bool,
    preview: bool,
}

fn as_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
}

impl GenerationResult {
    pub fn new(preview: bool) -> Self {
        Self {
            preview,
            ..Self::default()
        }
    }

    pub fn add_file(&mut self, file: GeneratedFile) {
        self.files.push(file);
    }

    pub fn warn(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    pub fn error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
    }

    /// Record an error that stopped the run.
    pub fn fatal(&mut self, error: impl Into<String>) {
        self.fatal = true;
        self.error(error);
    }

    pub fn cancel(&mut self, reason: impl Into<String>) {
        if self.cancelled.is_none() {
            self.cancelled = Some(reason.into());
        }
    }

    pub fn set_elapsed(&mut self, elapsed: Duration) {
        self.elapsed = elapsed;
    }

    pub fn files(&self) -> &[GeneratedFile] {
        &self.files
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn cancelled(&self) -> Option<&str> {
        self.cancelled.as_deref()
    }

    pub fn is_fatal(&self) -> bool {
        self.fatal
    }

    pub fn is_preview(&self) -> bool {
        self.preview
    }

    /// No errors, no fatal failure, not cancelled.
    pub fn is_success(&self) -> bool {
        self.errors.is_empty() && !self.fatal && self.cancelled.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_requires_no_errors_and_no_cancellation() {
        let mut result = GenerationResult::new(false);
        result.warn("only a warning");
        assert!(result.is_success());

        result.cancel("user pressed ctrl-c");
        result.cancel("second reason ignored");
        assert!(!result.is_success());
        assert_eq!(result.cancelled(), Some("user pressed ctrl-c"));
        assert!(result.errors().is_empty());
    }

    #[test]
    fn fatal_is_also_an_error_entry() {
        let mut result = GenerationResult::new(true);
        result.fatal("tree invariant violated");
        assert!(result.is_fatal());
        assert_eq!(result.errors().len(), 1);
        assert!(result.is_preview());
    }

    #[test]
    fn overwrite_policy_parses_and_serializes_kebab_case() {
        assert_eq!("if-changed".parse::<OverwritePolicy>().unwrap(), OverwritePolicy::IfChanged);
        assert!("sometimes".parse::<OverwritePolicy>().is_err());
        assert_eq!(
            serde_json::to_string(&OverwritePolicy::IfChanged).unwrap(),
            "\"if-changed\""
        );
    }

    #[test]
    fn result_serializes_elapsed_as_millis() {
        let mut result = GenerationResult::new(false);
        result.set_elapsed(Duration::from_millis(42));
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["elapsed_ms"], 42);
        assert_eq!(json["cancelled"], serde_json::Value::Null);
    }
}
