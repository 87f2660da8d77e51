//! The structured domain description a run starts from.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::error::DomainError;

/// A named domain with its entities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainSchema {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default)]
    pub entities: Vec<EntityDef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDef {
    pub name: String,
    #[serde(default)]
    pub properties: Vec<PropertyDef>,
    /// Template id overriding the default entity template.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDef {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: DataType,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default)]
    pub nullable: bool,
}

impl DomainSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            entities: Vec::new(),
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_entity(mut self, entity: EntityDef) -> Self {
        self.entities.push(entity);
        self
    }

    pub fn entity(&self, name: &str) -> Option<&EntityDef> {
        self.entities.iter().find(|e| e.name == name)
    }
}

impl EntityDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: Vec::new(),
            template: None,
        }
    }

    pub fn with_property(mut self, property: PropertyDef) -> Self {
        self.properties.push(property);
        self
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }
}

impl PropertyDef {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            primary_key: false,
            nullable: false,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }
}

// ── Data types ───────────────────────────────────────────────────────────────

/// Column / property data types understood by the built-in generators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    String,
    Integer,
    Long,
    Decimal,
    Float,
    Boolean,
    Date,
    DateTime,
    Uuid,
    Binary,
}

impl DataType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Long => "long",
            Self::Decimal => "decimal",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::DateTime => "datetime",
            Self::Uuid => "uuid",
            Self::Binary => "binary",
        }
    }

    /// C#-style type name used by the built-in entity class template.
    pub const fn clr_type(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "int",
            Self::Long => "long",
            Self::Decimal => "decimal",
            Self::Float => "double",
            Self::Boolean => "bool",
            Self::Date | Self::DateTime => "DateTime",
            Self::Uuid => "Guid",
            Self::Binary => "byte[]",
        }
    }

    /// Whether the mapped type is a value type (needs `?` to be nullable).
    pub const fn is_value_type(&self) -> bool {
        !matches!(self, Self::String | Self::Binary)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "string" | "text" | "varchar" => Ok(Self::String),
            "integer" | "int" => Ok(Self::Integer),
            "long" | "bigint" => Ok(Self::Long),
            "decimal" | "money" => Ok(Self::Decimal),
            "float" | "double" | "real" => Ok(Self::Float),
            "boolean" | "bool" => Ok(Self::Boolean),
            "date" => Ok(Self::Date),
            "datetime" | "timestamp" => Ok(Self::DateTime),
            "uuid" | "guid" => Ok(Self::Uuid),
            "binary" | "blob" => Ok(Self::Binary),
            other => Err(DomainError::InvalidSchema(format!(
                "unknown data type '{}'",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_deserializes_from_json() {
        let schema: DomainSchema = serde_json::from_str(
            r#"{
                "name": "Shop",
                "namespace": "Acme.Shop",
                "entities": [
                    { "name": "Customer", "properties": [
                        { "name": "id", "type": "integer", "primary_key": true },
                        { "name": "firstName", "type": "string" }
                    ]}
                ]
            }"#,
        )
        .unwrap();

        let customer = schema.entity("Customer").unwrap();
        assert_eq!(customer.properties.len(), 2);
        assert!(customer.properties[0].primary_key);
        assert_eq!(customer.properties[1].data_type, DataType::String);
        assert!(!customer.properties[1].nullable);
    }

    #[test]
    fn data_type_aliases() {
        assert_eq!("INT".parse::<DataType>().unwrap(), DataType::Integer);
        assert_eq!("guid".parse::<DataType>().unwrap(), DataType::Uuid);
        assert!("matrix".parse::<DataType>().is_err());
        assert_eq!(DataType::Integer.clr_type(), "int");
        assert!(!DataType::String.is_value_type());
    }
}
