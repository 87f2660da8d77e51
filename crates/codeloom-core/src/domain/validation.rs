use std::collections::HashSet;

use crate::domain::{
    error::DomainError,
    naming::to_pascal_case,
    schema::{DomainSchema, EntityDef},
    template::TemplateId,
};

/// Centralized domain validation.
///
/// All validation logic lives here, not scattered across entities.
pub struct DomainValidator;

impl DomainValidator {
    /// Reject schemas that would produce colliding or unnamed artifacts.
    pub fn validate_schema(schema: &DomainSchema) -> Result<(), DomainError> {
        if schema.name.trim().is_empty() {
            return Err(DomainError::MissingRequiredField { field: "name" });
        }

        let mut names = HashSet::new();
        for entity in &schema.entities {
            Self::validate_entity(entity)?;
            // Entities become PascalCase class names; compare in that form.
            if !names.insert(to_pascal_case(&entity.name)) {
                return Err(DomainError::InvalidSchema(format!(
                    "entity '{}' is declared more than once",
                    entity.name
                )));
            }
        }
        Ok(())
    }

    pub fn validate_entity(entity: &EntityDef) -> Result<(), DomainError> {
        if entity.name.trim().is_empty() {
            return Err(DomainError::InvalidSchema("entity with an empty name".into()));
        }

        let mut names = HashSet::new();
        for property in &entity.properties {
            if property.name.trim().is_empty() {
                return Err(DomainError::InvalidSchema(format!(
                    "entity '{}' has a property with an empty name",
                    entity.name
                )));
            }
            if !names.insert(to_pascal_case(&property.name)) {
                return Err(DomainError::InvalidSchema(format!(
                    "property '{}' of entity '{}' is declared more than once",
                    property.name, entity.name
                )));
            }
        }

        if let Some(template) = &entity.template {
            TemplateId::parse(template)?;
        }
        Ok(())
    }
}
