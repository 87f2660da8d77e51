use async_trait::async_trait;

use crate::application::{ApplicationError, ArtifactCreated, Generator, GeneratorContext, Reaction};
use crate::domain::{
    ArtifactDraft, ArtifactKind, ArtifactTree, DatasourceBacked, DomainError, EntityTemplate,
    TemplateId, naming, props,
};
use crate::error::CodeloomResult;

/// Turns each datasource-backed table or view into an Entity under the
/// owning project, one EntityProperty per column.
#[derive(Debug, Default)]
pub struct EntityGenerator;

impl EntityGenerator {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Generator for EntityGenerator {
    fn name(&self) -> &str {
        "entity"
    }

    fn accepts(&self, event: &ArtifactCreated) -> bool {
        matches!(event.kind, ArtifactKind::Table | ArtifactKind::View)
    }

    async fn react(
        &self,
        event: &ArtifactCreated,
        tree: &ArtifactTree,
        ctx: &GeneratorContext,
    ) -> CodeloomResult<Reaction> {
        let mut reaction = Reaction::none();
        if tree.decorator::<DatasourceBacked>(event.artifact).is_none() {
            return Ok(reaction);
        }

        let table = tree
            .get(event.artifact)
            .ok_or(DomainError::ArtifactNotFound { id: event.artifact })?;
        let Some(project) = tree.find_ancestor_of_kind(table.id(), ArtifactKind::Project) else {
            reaction.warn(format!("table '{}' is outside any project", table.label()));
            return Ok(reaction);
        };

        let entity_name = naming::to_pascal_case(table.label());
        if tree
            .find_child_by_label(project.id(), ArtifactKind::Entity, &entity_name)
            .is_some()
        {
            reaction.warn(format!("entity '{}' already exists", entity_name));
            return Ok(reaction);
        }

        let template = table
            .text(props::TEMPLATE)
            .unwrap_or(ctx.settings.entity_template.as_str());
        let template = match TemplateId::parse(template) {
            Ok(id) => id,
            Err(e) => {
                reaction.error(format!("entity '{}': {}", entity_name, e));
                return Ok(reaction);
            }
        };

        let mut entity = ArtifactDraft::new(ArtifactKind::Entity, entity_name)
            .with_property(props::COLUMN, table.label())
            .with_decorator(EntityTemplate::new(&template));

        for column in tree
            .children(table.id())
            .filter(|c| c.kind() == ArtifactKind::Column)
        {
            if ctx.is_cancelled() {
                return Err(ApplicationError::Cancelled.into());
            }
            entity = entity.with_child(
                ArtifactDraft::new(
                    ArtifactKind::EntityProperty,
                    naming::to_pascal_case(column.label()),
                )
                .with_property(props::COLUMN, column.label())
                .with_property(props::DATA_TYPE, column.text(props::DATA_TYPE).unwrap_or("string"))
                .with_property(props::PRIMARY_KEY, column.flag(props::PRIMARY_KEY))
                .with_property(props::NULLABLE, column.flag(props::NULLABLE)),
            );
        }

        reaction.attach(project.id(), entity);
        Ok(reaction)
    }
}
