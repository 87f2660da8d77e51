use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::Value;
use tracing::debug;

use crate::application::{ArtifactCreated, Generator, GeneratorContext, Reaction};
use crate::domain::{ArtifactDraft, ArtifactKind, ArtifactTree, DomainError, TemplateId, params};
use crate::error::CodeloomResult;

/// Lays out a freshly created project: the standard folders, the project
/// file and the optional project template folder.
pub struct ProjectLayoutGenerator {
    folders: Vec<String>,
    project_file: Option<TemplateId>,
}

impl Default for ProjectLayoutGenerator {
    fn default() -> Self {
        Self {
            folders: vec![super::MODELS_FOLDER.to_string()],
            project_file: TemplateId::parse(super::PROJECT_FILE_TEMPLATE).ok(),
        }
    }
}

impl ProjectLayoutGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_folder(mut self, name: impl Into<String>) -> Self {
        self.folders.push(name.into());
        self
    }

    /// Template rendering the project file; `None` disables it.
    pub fn with_project_file(mut self, template: Option<TemplateId>) -> Self {
        self.project_file = template;
        self
    }
}

#[async_trait]
impl Generator for ProjectLayoutGenerator {
    fn name(&self) -> &str {
        "project-layout"
    }

    fn accepts(&self, event: &ArtifactCreated) -> bool {
        event.kind == ArtifactKind::Project
    }

    async fn react(
        &self,
        event: &ArtifactCreated,
        tree: &ArtifactTree,
        ctx: &GeneratorContext,
    ) -> CodeloomResult<Reaction> {
        let project = tree
            .get(event.artifact)
            .ok_or(DomainError::ArtifactNotFound { id: event.artifact })?;
        let mut reaction = Reaction::none();

        let mut parameters: IndexMap<String, Value> = IndexMap::new();
        parameters.insert("project".into(), project.label().into());
        parameters.insert("namespace".into(), ctx.namespace_for(project).into());

        if let Some(folder) = &ctx.settings.project_template {
            match TemplateId::parse(folder) {
                Ok(id) => {
                    let output = ctx
                        .renderer
                        .render(&id, parameters.clone(), &ctx.cancel)
                        .await;
                    reaction.absorb(project.id(), output, id.as_str());
                }
                Err(e) => reaction.error(e.to_string()),
            }
        }

        // Folders a project template already provides are not added twice.
        for folder in &self.folders {
            let provided = reaction.attachments.iter().any(|a| {
                a.draft.kind == ArtifactKind::Folder && a.draft.label == *folder
            }) || tree
                .find_child_by_label(project.id(), ArtifactKind::Folder, folder)
                .is_some();
            if !provided {
                reaction.attach(project.id(), ArtifactDraft::folder(folder.clone()));
            }
        }

        if let Some(id) = &self.project_file {
            let mut parameters = parameters;
            parameters.insert(
                params::OUTPUT_FILE_NAME.into(),
                format!("{}.csproj", project.label()).into(),
            );
            let output = ctx.renderer.render(id, parameters, &ctx.cancel).await;
            reaction.absorb(project.id(), output, id.as_str());
        }

        debug!(
            project = project.label(),
            attachments = reaction.attachments.len(),
            "Project layout prepared"
        );
        Ok(reaction)
    }
}
