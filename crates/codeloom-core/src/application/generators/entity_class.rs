use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::{Value, json};

use crate::application::{ArtifactCreated, Generator, GeneratorContext, Reaction};
use crate::domain::{
    ArtifactDraft, ArtifactKind, ArtifactTree, DataType, DomainError, EntityTemplate, TemplateId,
    params, props,
};
use crate::error::CodeloomResult;

/// Renders one source file per Entity into the project's models folder.
#[derive(Debug, Default)]
pub struct EntityClassGenerator;

impl EntityClassGenerator {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Generator for EntityClassGenerator {
    fn name(&self) -> &str {
        "entity-class"
    }

    fn accepts(&self, event: &ArtifactCreated) -> bool {
        event.kind == ArtifactKind::Entity
    }

    async fn react(
        &self,
        event: &ArtifactCreated,
        tree: &ArtifactTree,
        ctx: &GeneratorContext,
    ) -> CodeloomResult<Reaction> {
        let entity = tree
            .get(event.artifact)
            .ok_or(DomainError::ArtifactNotFound { id: event.artifact })?;
        let mut reaction = Reaction::none();

        let template = match tree.decorator::<EntityTemplate>(entity.id()) {
            Some(decorator) => decorator.template_id()?,
            None => TemplateId::parse(&ctx.settings.entity_template)?,
        };
        let Some(project) = tree.find_ancestor_of_kind(entity.id(), ArtifactKind::Project) else {
            reaction.warn(format!("entity '{}' is outside any project", entity.label()));
            return Ok(reaction);
        };

        let properties: Vec<Value> = tree
            .children(entity.id())
            .filter(|p| p.kind() == ArtifactKind::EntityProperty)
            .map(|p| {
                let data_type = p
                    .text(props::DATA_TYPE)
                    .and_then(|t| t.parse::<DataType>().ok())
                    .unwrap_or(DataType::String);
                let nullable = p.flag(props::NULLABLE);
                let clr_type = if nullable && data_type.is_value_type() {
                    format!("{}?", data_type.clr_type())
                } else {
                    data_type.clr_type().to_string()
                };
                json!({
                    "name": p.label(),
                    "column": p.text(props::COLUMN).unwrap_or(p.label()),
                    "type": clr_type,
                    "data_type": data_type.as_str(),
                    "nullable": nullable,
                    "primary_key": p.flag(props::PRIMARY_KEY),
                })
            })
            .collect();

        let mut parameters: IndexMap<String, Value> = IndexMap::new();
        parameters.insert("entity".into(), entity.label().into());
        parameters.insert("namespace".into(), ctx.namespace_for(project).into());
        parameters.insert("properties".into(), Value::Array(properties));
        parameters.insert(
            params::OUTPUT_FILE_NAME.into(),
            format!("{}.cs", entity.label()).into(),
        );

        let output = ctx.renderer.render(&template, parameters, &ctx.cancel).await;
        let source = format!("entity '{}'", entity.label());

        match tree.find_child_by_label(project.id(), ArtifactKind::Folder, super::MODELS_FOLDER) {
            Some(models) => reaction.absorb(models.id(), output, &source),
            None => {
                let (artifacts, warnings, errors) = output.into_parts();
                if !artifacts.is_empty() {
                    reaction.attach(
                        project.id(),
                        ArtifactDraft::folder(super::MODELS_FOLDER).with_children(artifacts),
                    );
                }
                reaction
                    .warnings
                    .extend(warnings.into_iter().map(|w| format!("{}: {}", source, w)));
                reaction
                    .errors
                    .extend(errors.into_iter().map(|e| format!("{}: {}", source, e)));
            }
        }
        Ok(reaction)
    }
}
