//! Folder aggregator: renders a whole directory as one template.
//!
//! Files whose extension has an engine are rendered with the folder's
//! parameters; everything else is copied verbatim. Subdirectories become
//! Folder artifacts. One failing file does not stop its siblings, so the
//! result may be [`TemplateOutput::Partial`].

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};
use walkdir::{DirEntry, WalkDir};

use codeloom_core::application::{RenderScope, TemplateEngine};
use codeloom_core::domain::{
    ArtifactDraft, Template, TemplateDiagnostic, TemplateId, TemplateInstance, TemplateOutput,
    TemplateSource, params,
};

use super::cancelled;
use crate::template_loader::is_definition_file;

/// Directory names skipped unless exclusions are replaced.
pub const DEFAULT_EXCLUSIONS: &[&str] = &["bin", "obj", "target", ".git", "node_modules"];

/// Hook for one file of a folder template, keyed by its relative path.
pub trait FileOverride: Send + Sync {
    /// Adjust the instance before the file is rendered.
    fn prepare(&self, _relative: &str, _instance: &mut TemplateInstance) {}

    /// Adjust what the file rendered to.
    fn transform(&self, _relative: &str, output: TemplateOutput) -> TemplateOutput {
        output
    }
}

pub struct FolderEngine {
    exclusions: Vec<String>,
    overrides: HashMap<String, Arc<dyn FileOverride>>,
}

impl Default for FolderEngine {
    fn default() -> Self {
        Self {
            exclusions: DEFAULT_EXCLUSIONS.iter().map(|s| s.to_string()).collect(),
            overrides: HashMap::new(),
        }
    }
}

struct Entry {
    relative: PathBuf,
    absolute: PathBuf,
    is_dir: bool,
}

#[derive(Default)]
struct Collected {
    warnings: Vec<String>,
    errors: Vec<TemplateDiagnostic>,
}

impl FolderEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Skip entries with this name or relative path (`/`-separated).
    pub fn exclude(mut self, pattern: impl Into<String>) -> Self {
        self.exclusions.push(pattern.into());
        self
    }

    /// Replace the exclusion list, defaults included.
    pub fn with_exclusions(mut self, patterns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.exclusions = patterns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_override(mut self, relative: impl Into<String>, hook: Arc<dyn FileOverride>) -> Self {
        self.overrides.insert(relative.into(), hook);
        self
    }

    fn is_excluded(&self, root: &Path, entry: &DirEntry) -> bool {
        if entry.depth() == 0 {
            return false;
        }
        let name = entry.file_name().to_string_lossy();
        let relative = relative_str(entry.path().strip_prefix(root).unwrap_or(entry.path()));
        self.exclusions
            .iter()
            .any(|pattern| *pattern == name || *pattern == relative)
    }

    fn scan(&self, root: &Path, collected: &mut Collected) -> Vec<Entry> {
        let walker = WalkDir::new(root)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !self.is_excluded(root, e));

        let mut entries = Vec::new();
        for entry in walker {
            match entry {
                Ok(entry) if entry.file_type().is_file() && is_definition_file(entry.path()) => {}
                Ok(entry) => {
                    let absolute = entry.path().to_path_buf();
                    let relative = absolute.strip_prefix(root).unwrap_or(&absolute).to_path_buf();
                    entries.push(Entry {
                        relative,
                        absolute,
                        is_dir: entry.file_type().is_dir(),
                    });
                }
                Err(e) => {
                    let path = e
                        .path()
                        .map(|p| relative_str(p.strip_prefix(root).unwrap_or(p)))
                        .unwrap_or_default();
                    warn!(error = %e, "Skipping unreadable folder entry");
                    collected
                        .errors
                        .push(TemplateDiagnostic::new(format!("cannot read entry: {}", e)).in_path(path));
                }
            }
        }
        entries
    }

    async fn render_file(
        &self,
        folder: &TemplateId,
        entry: &Entry,
        shared: &IndexMap<String, Value>,
        scope: &RenderScope<'_>,
        cancel: &CancellationToken,
        collected: &mut Collected,
    ) -> Vec<ArtifactDraft> {
        let relative = relative_str(&entry.relative);
        let file_name = entry
            .absolute
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| relative.clone());

        let engine = entry
            .absolute
            .extension()
            .and_then(|e| e.to_str())
            .and_then(|ext| scope.engines.for_extension(ext));
        let Some(engine) = engine else {
            debug!(file = %relative, "Copying file verbatim");
            return vec![ArtifactDraft::existing_file(file_name, &entry.absolute)];
        };

        let id = match TemplateId::parse(&format!("{}/{}", folder, relative)) {
            Ok(id) => id,
            Err(e) => {
                collected
                    .errors
                    .push(TemplateDiagnostic::new(e.to_string()).in_path(relative));
                return Vec::new();
            }
        };

        let mut instance = TemplateInstance::new(Template::file(id, &entry.absolute));
        instance.extend_parameters(shared.clone());
        let hook = self.overrides.get(&relative);
        if let Some(hook) = hook {
            hook.prepare(&relative, &mut instance);
        }
        let definition_warnings = scope.definition_warnings(&instance);

        let mut output = engine.render(&instance, scope, cancel).await;
        if let Some(hook) = hook {
            output = hook.transform(&relative, output);
        }
        for warning in definition_warnings {
            output = output.with_warning(warning);
        }

        let (artifacts, warnings, errors) = output.into_parts();
        if artifacts.is_empty() && errors.is_empty() {
            collected.warnings.push(format!("{}: produced no output", relative));
        }
        collected
            .warnings
            .extend(warnings.into_iter().map(|w| format!("{}: {}", relative, w)));
        let absolute = entry.absolute.display().to_string();
        collected.errors.extend(errors.into_iter().map(|mut e| {
            if e.path.as_deref().is_none_or(|p| p == absolute) {
                e.path = Some(relative.clone());
            }
            e
        }));
        artifacts
    }
}

/// Arrange rendered files under their folders, keeping walk order.
fn assemble(
    parent: &Path,
    entries: &[Entry],
    children: &BTreeMap<PathBuf, Vec<usize>>,
    rendered: &mut HashMap<usize, Vec<ArtifactDraft>>,
) -> Vec<ArtifactDraft> {
    let mut drafts = Vec::new();
    for &index in children.get(parent).map(Vec::as_slice).unwrap_or(&[]) {
        let entry = &entries[index];
        if entry.is_dir {
            let name = entry
                .relative
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let nested = assemble(&entry.relative, entries, children, rendered);
            drafts.push(ArtifactDraft::folder(name).with_children(nested));
        } else if let Some(files) = rendered.remove(&index) {
            drafts.extend(files);
        }
    }
    drafts
}

fn relative_str(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

#[async_trait]
impl TemplateEngine for FolderEngine {
    fn name(&self) -> &'static str {
        "folder"
    }

    fn extensions(&self) -> &[&'static str] {
        &[]
    }

    #[instrument(skip_all, fields(template = %instance.template().id()))]
    async fn render(
        &self,
        instance: &TemplateInstance,
        scope: &RenderScope<'_>,
        cancel: &CancellationToken,
    ) -> TemplateOutput {
        let template = instance.template();
        let TemplateSource::Folder(root) = template.source() else {
            return TemplateOutput::failure_message(format!(
                "template '{}' is not a folder",
                template.id()
            ));
        };

        let mut shared = instance.parameters().clone();
        shared.shift_remove(params::OUTPUT_FILE_NAME);

        let mut collected = Collected::default();
        let entries = self.scan(root, &mut collected);

        let mut children: BTreeMap<PathBuf, Vec<usize>> = BTreeMap::new();
        let mut rendered = HashMap::new();
        for (index, entry) in entries.iter().enumerate() {
            let parent = entry.relative.parent().map(Path::to_path_buf).unwrap_or_default();
            children.entry(parent).or_default().push(index);
            if entry.is_dir {
                continue;
            }
            if cancel.is_cancelled() {
                return cancelled();
            }
            let drafts = self
                .render_file(template.id(), entry, &shared, scope, cancel, &mut collected)
                .await;
            rendered.insert(index, drafts);
        }

        let artifacts = assemble(Path::new(""), &entries, &children, &mut rendered);
        debug!(
            entries = entries.len(),
            errors = collected.errors.len(),
            "Folder template rendered"
        );

        let Collected { warnings, errors } = collected;
        match (errors.is_empty(), artifacts.is_empty()) {
            (true, _) => TemplateOutput::Success { artifacts, warnings },
            (false, true) => TemplateOutput::Failure { errors },
            (false, false) => TemplateOutput::Partial {
                artifacts,
                warnings,
                errors,
            },
        }
    }
}
