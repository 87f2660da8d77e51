//! Template identity, sources, parameterized instances and render outputs.
//!
//! These are plain data: resolution lives in the application layer and
//! engines live in the adapters.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::domain::artifact::ArtifactDraft;
use crate::domain::error::DomainError;

/// Prefix marking a special-folder template id (`@folder/relative/path`).
pub const SPECIAL_FOLDER_SIGIL: char = '@';

/// Reserved and built-in parameter names.
pub mod params {
    /// Overrides the file name an engine gives its output.
    pub const OUTPUT_FILE_NAME: &str = "output_file_name";
    /// Selects the output format of engines that have more than one.
    pub const OUTPUT_FORMAT: &str = "output_format";
    /// RFC 3339 timestamp injected by the renderer.
    pub const GENERATED_AT: &str = "generated_at";
    /// Current year injected by the renderer.
    pub const YEAR: &str = "year";

    pub const RESERVED: &[&str] = &[OUTPUT_FILE_NAME, OUTPUT_FORMAT, GENERATED_AT, YEAR];
}

// ============================================================================
// Template Identity
// ============================================================================

/// Logical template id.
///
/// Either a plain id (`entity-class`) resolved through the template store, or
/// a special-folder id (`@templates/Models/Entity.cs.tera`) resolved to a path
/// at render time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TemplateId(String);

impl TemplateId {
    /// Parse and validate a template id.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTemplateId` for empty ids, special-folder ids without
    /// a folder or relative part, and relative parts that climb out of their
    /// folder.
    pub fn parse(s: &str) -> Result<Self, DomainError> {
        let id = s.trim();
        let invalid = |reason: &str| DomainError::InvalidTemplateId {
            id: s.to_string(),
            reason: reason.to_string(),
        };

        if id.is_empty() {
            return Err(invalid("id is empty"));
        }

        if let Some(rest) = id.strip_prefix(SPECIAL_FOLDER_SIGIL) {
            let Some((folder, relative)) = rest.split_once('/') else {
                return Err(invalid("expected '@folder/relative/path'"));
            };
            if folder.is_empty() || relative.is_empty() {
                return Err(invalid("expected '@folder/relative/path'"));
            }
            if relative.split('/').any(|seg| seg == "..") {
                return Err(invalid("relative path may not contain '..'"));
            }
        }

        Ok(Self(id.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_special_folder(&self) -> bool {
        self.0.starts_with(SPECIAL_FOLDER_SIGIL)
    }

    /// Split a special-folder id into `(folder, relative_path)`.
    pub fn special_folder(&self) -> Option<(&str, &str)> {
        self.0.strip_prefix(SPECIAL_FOLDER_SIGIL)?.split_once('/')
    }
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TemplateId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for TemplateId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TemplateId> for String {
    fn from(value: TemplateId) -> Self {
        value.0
    }
}

// ============================================================================
// Template
// ============================================================================

/// Where a template's text comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSource {
    /// Compiled into the binary.
    Static(&'static str),
    /// Held in memory (user-registered).
    Owned(String),
    /// A single template file.
    File(PathBuf),
    /// A directory rendered by the folder aggregator.
    Folder(PathBuf),
}

impl TemplateSource {
    pub fn inline_text(&self) -> Option<&str> {
        match self {
            Self::Static(s) => Some(*s),
            Self::Owned(s) => Some(s.as_str()),
            Self::File(_) | Self::Folder(_) => None,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::File(p) | Self::Folder(p) => Some(p.as_path()),
            Self::Static(_) | Self::Owned(_) => None,
        }
    }

    pub fn is_folder(&self) -> bool {
        matches!(self, Self::Folder(_))
    }
}

/// An immutable template: id, source, engine key and caching policy.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    id: TemplateId,
    source: TemplateSource,
    engine: Option<String>,
    cacheable: bool,
    description: Option<String>,
    definition: Option<TemplateDefinition>,
}

impl Template {
    fn with_source(id: TemplateId, source: TemplateSource, engine: Option<String>) -> Self {
        Self {
            id,
            source,
            engine,
            cacheable: false,
            description: None,
            definition: None,
        }
    }

    /// Built-in template text rendered by the engine registered for `engine`.
    pub fn inline(id: TemplateId, engine: impl Into<String>, text: &'static str) -> Self {
        Self::with_source(id, TemplateSource::Static(text), Some(engine.into())).cacheable(true)
    }

    pub fn owned(id: TemplateId, engine: impl Into<String>, text: impl Into<String>) -> Self {
        Self::with_source(id, TemplateSource::Owned(text.into()), Some(engine.into()))
    }

    /// A template file; the engine is chosen by the file extension.
    pub fn file(id: TemplateId, path: impl Into<PathBuf>) -> Self {
        Self::with_source(id, TemplateSource::File(path.into()), None)
    }

    pub fn folder(id: TemplateId, path: impl Into<PathBuf>) -> Self {
        Self::with_source(id, TemplateSource::Folder(path.into()), None)
    }

    pub fn cacheable(mut self, cacheable: bool) -> Self {
        self.cacheable = cacheable;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_definition(mut self, definition: TemplateDefinition) -> Self {
        self.definition = Some(definition);
        self
    }

    pub fn id(&self) -> &TemplateId {
        &self.id
    }

    pub fn source(&self) -> &TemplateSource {
        &self.source
    }

    pub fn is_cacheable(&self) -> bool {
        self.cacheable
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn definition(&self) -> Option<&TemplateDefinition> {
        self.definition.as_ref()
    }

    /// Engine key: explicit for inline templates, the last file extension
    /// for file templates, `None` for folders.
    pub fn engine_key(&self) -> Option<&str> {
        if let Some(engine) = &self.engine {
            return Some(engine.as_str());
        }
        match &self.source {
            TemplateSource::File(path) => path.extension().and_then(|e| e.to_str()),
            _ => None,
        }
    }

    /// Default output file name: the template file name without its engine
    /// extension (`Customer.cs.tera` -> `Customer.cs`), or the last id
    /// segment for inline templates.
    pub fn output_stem(&self) -> String {
        match &self.source {
            TemplateSource::File(path) | TemplateSource::Folder(path) => path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or(self.id.as_str())
                .to_string(),
            TemplateSource::Static(_) | TemplateSource::Owned(_) => self
                .id
                .as_str()
                .rsplit('/')
                .next()
                .unwrap_or(self.id.as_str())
                .to_string(),
        }
    }
}

// ============================================================================
// Definitions
// ============================================================================

/// Declared parameters of a template, read from a `.params.toml` sibling.
///
/// Used by tooling to warn about missing or mistyped parameters; rendering
/// never depends on it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub parameters: Vec<ParameterDefinition>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterDefinition {
    pub name: String,
    #[serde(rename = "type", default = "any_type")]
    pub type_descriptor: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub required: bool,
}

fn any_type() -> String {
    "any".to_string()
}

impl TemplateDefinition {
    /// Warnings for missing required parameters and type mismatches.
    pub fn validate(&self, instance: &TemplateInstance) -> Vec<String> {
        let mut warnings = Vec::new();
        for param in &self.parameters {
            match instance.parameter(&param.name) {
                None if param.required => warnings.push(format!(
                    "template '{}' is missing required parameter '{}'",
                    instance.template().id(),
                    param.name
                )),
                Some(value) if !type_matches(&param.type_descriptor, value) => {
                    warnings.push(format!(
                        "parameter '{}' of template '{}' should be {}",
                        param.name,
                        instance.template().id(),
                        param.type_descriptor
                    ))
                }
                _ => {}
            }
        }
        warnings
    }
}

fn type_matches(descriptor: &str, value: &Value) -> bool {
    match descriptor.to_ascii_lowercase().as_str() {
        "string" | "text" => value.is_string(),
        "number" | "integer" | "int" | "float" => value.is_number(),
        "bool" | "boolean" => value.is_boolean(),
        "array" | "list" => value.is_array(),
        "object" | "map" => value.is_object(),
        _ => true,
    }
}

// ============================================================================
// Instances
// ============================================================================

/// A template plus the named parameters it is rendered with.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateInstance {
    template: Template,
    parameters: IndexMap<String, Value>,
}

impl TemplateInstance {
    pub fn new(template: Template) -> Self {
        Self {
            template,
            parameters: IndexMap::new(),
        }
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    /// Swap the template while keeping the parameters.
    pub fn replace_template(&mut self, template: Template) {
        self.template = template;
    }

    pub fn set_parameter(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.parameters.insert(name.into(), value.into());
    }

    /// Set a parameter unless the caller already supplied one.
    pub fn set_default(&mut self, name: &str, value: impl Into<Value>) {
        if !self.parameters.contains_key(name) {
            self.parameters.insert(name.to_string(), value.into());
        }
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_parameter(name, value);
        self
    }

    pub fn extend_parameters(&mut self, parameters: impl IntoIterator<Item = (String, Value)>) {
        self.parameters.extend(parameters);
    }

    pub fn remove_parameter(&mut self, name: &str) -> Option<Value> {
        self.parameters.shift_remove(name)
    }

    pub fn parameter(&self, name: &str) -> Option<&Value> {
        self.parameters.get(name)
    }

    pub fn parameter_str(&self, name: &str) -> Option<&str> {
        self.parameter(name).and_then(Value::as_str)
    }

    pub fn parameters(&self) -> &IndexMap<String, Value> {
        &self.parameters
    }

    pub fn output_file_name(&self) -> Option<&str> {
        self.parameter_str(params::OUTPUT_FILE_NAME)
            .filter(|s| !s.trim().is_empty())
    }

    pub fn output_format(&self) -> Option<&str> {
        self.parameter_str(params::OUTPUT_FORMAT)
    }

    /// Output file name, falling back to the template's own stem.
    pub fn resolved_file_name(&self) -> String {
        self.output_file_name()
            .map(str::to_string)
            .unwrap_or_else(|| self.template.output_stem())
    }
}

// ============================================================================
// Outputs
// ============================================================================

/// One rendering problem, with a source location when the engine knows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateDiagnostic {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<(usize, usize)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl TemplateDiagnostic {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            location: None,
            path: None,
        }
    }

    pub fn at(mut self, line: usize, column: usize) -> Self {
        self.location = Some((line, column));
        self
    }

    pub fn in_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }
}

impl fmt::Display for TemplateDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(path) = &self.path {
            write!(f, "{}:", path)?;
        }
        if let Some((line, column)) = self.location {
            write!(f, "{}:{}:", line, column)?;
        }
        if self.path.is_some() || self.location.is_some() {
            f.write_str(" ")?;
        }
        f.write_str(&self.message)
    }
}

/// Result of rendering one template instance.
///
/// Expected failures are values, never panics or `Err`.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateOutput {
    Success {
        artifacts: Vec<ArtifactDraft>,
        warnings: Vec<String>,
    },
    /// Only produced by aggregating engines: some entries rendered, some
    /// failed. Single-file engines return `Success` or `Failure`.
    Partial {
        artifacts: Vec<ArtifactDraft>,
        warnings: Vec<String>,
        errors: Vec<TemplateDiagnostic>,
    },
    Failure {
        errors: Vec<TemplateDiagnostic>,
    },
}

impl TemplateOutput {
    pub fn success(artifacts: Vec<ArtifactDraft>) -> Self {
        Self::Success {
            artifacts,
            warnings: Vec::new(),
        }
    }

    pub fn failure(error: TemplateDiagnostic) -> Self {
        Self::Failure {
            errors: vec![error],
        }
    }

    pub fn failure_message(message: impl Into<String>) -> Self {
        Self::failure(TemplateDiagnostic::new(message))
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure { .. })
    }

    pub fn artifacts(&self) -> &[ArtifactDraft] {
        match self {
            Self::Success { artifacts, .. } | Self::Partial { artifacts, .. } => artifacts,
            Self::Failure { .. } => &[],
        }
    }

    pub fn warnings(&self) -> &[String] {
        match self {
            Self::Success { warnings, .. } | Self::Partial { warnings, .. } => warnings,
            Self::Failure { .. } => &[],
        }
    }

    pub fn errors(&self) -> &[TemplateDiagnostic] {
        match self {
            Self::Partial { errors, .. } | Self::Failure { errors } => errors,
            Self::Success { .. } => &[],
        }
    }

    /// Append a warning. Failures carry no warnings, so this is a no-op there.
    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        match &mut self {
            Self::Success { warnings, .. } | Self::Partial { warnings, .. } => {
                warnings.push(warning.into())
            }
            Self::Failure { .. } => {}
        }
        self
    }

    /// Split into `(artifacts, warnings, errors)`.
    pub fn into_parts(self) -> (Vec<ArtifactDraft>, Vec<String>, Vec<TemplateDiagnostic>) {
        match self {
            Self::Success {
                artifacts,
                warnings,
            } => (artifacts, warnings, Vec::new()),
            Self::Partial {
                artifacts,
                warnings,
                errors,
            } => (artifacts, warnings, errors),
            Self::Failure { errors } => (Vec::new(), Vec::new(), errors),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::artifact::ArtifactContent;
    use serde_json::json;

    fn id(s: &str) -> TemplateId {
        TemplateId::parse(s).unwrap()
    }

    #[test]
    fn plain_and_special_folder_ids() {
        assert!(!id("entity-class").is_special_folder());
        let special = id("@templates/Models/Entity.cs.tera");
        assert_eq!(special.special_folder(), Some(("templates", "Models/Entity.cs.tera")));
    }

    #[test]
    fn malformed_ids_are_rejected() {
        for bad in ["", "   ", "@", "@folder", "@/x", "@f/", "@f/../escape"] {
            assert!(TemplateId::parse(bad).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn engine_key_comes_from_last_extension() {
        let t = Template::file(id("@t/Customer.cs.tera"), "/t/Customer.cs.tera");
        assert_eq!(t.engine_key(), Some("tera"));
        assert_eq!(t.output_stem(), "Customer.cs");

        let inline = Template::inline(id("entity-class"), "tera", "x");
        assert_eq!(inline.engine_key(), Some("tera"));
        assert!(inline.is_cacheable());
        assert_eq!(Template::folder(id("@t/p"), "/t/p").engine_key(), None);
    }

    #[test]
    fn output_file_name_overrides_stem() {
        let t = Template::file(id("@t/Entity.cs.tera"), "/t/Entity.cs.tera");
        let mut instance = TemplateInstance::new(t);
        assert_eq!(instance.resolved_file_name(), "Entity.cs");

        instance.set_parameter(params::OUTPUT_FILE_NAME, "Customer.cs");
        assert_eq!(instance.resolved_file_name(), "Customer.cs");

        instance.set_default(params::OUTPUT_FILE_NAME, "ignored.cs");
        assert_eq!(instance.output_file_name(), Some("Customer.cs"));
    }

    #[test]
    fn definition_flags_missing_and_mistyped_parameters() {
        let definition = TemplateDefinition {
            description: None,
            parameters: vec![
                ParameterDefinition {
                    name: "entity".into(),
                    type_descriptor: "string".into(),
                    description: String::new(),
                    required: true,
                },
                ParameterDefinition {
                    name: "properties".into(),
                    type_descriptor: "array".into(),
                    description: String::new(),
                    required: false,
                },
            ],
        };
        let instance = TemplateInstance::new(Template::inline(id("x"), "tera", ""))
            .with_parameter("properties", json!("not a list"));

        let warnings = definition.validate(&instance);
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].contains("missing required parameter 'entity'"));
        assert!(warnings[1].contains("should be array"));
    }

    #[test]
    fn outputs_never_mix_success_and_failure_accessors() {
        let ok = TemplateOutput::success(vec![ArtifactDraft::file(
            "a.txt",
            ArtifactContent::Text("a".into()),
        )])
        .with_warning("careful");
        assert_eq!(ok.artifacts().len(), 1);
        assert!(ok.errors().is_empty());
        assert_eq!(ok.warnings(), ["careful".to_string()]);

        let failed = TemplateOutput::failure(TemplateDiagnostic::new("boom").at(3, 7).in_path("a.tpl"))
            .with_warning("dropped");
        assert!(failed.artifacts().is_empty());
        assert!(failed.warnings().is_empty());
        assert_eq!(failed.errors()[0].to_string(), "a.tpl:3:7: boom");
    }
}
