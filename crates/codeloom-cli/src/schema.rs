//! Reading a [`DomainSchema`] from a `.json` or `.toml` file.

use std::io::ErrorKind;
use std::path::Path;

use tracing::{debug, instrument};

use codeloom_core::domain::{DomainSchema, DomainValidator};

use crate::error::{CliError, CliResult};

#[instrument(fields(path = %path.display()))]
pub fn load_schema(path: &Path) -> CliResult<DomainSchema> {
    let raw = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => CliError::SchemaNotFound {
            path: path.to_path_buf(),
        },
        _ => CliError::IoError {
            message: format!("Failed to read schema '{}'", path.display()),
            source: e,
        },
    })?;

    let invalid = |reason: String| CliError::InvalidSchema {
        path: path.to_path_buf(),
        reason,
    };
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    let schema: DomainSchema = match extension.as_deref() {
        Some("json") => serde_json::from_str(&raw).map_err(|e| invalid(e.to_string()))?,
        Some("toml") => toml::from_str(&raw).map_err(|e| invalid(e.to_string()))?,
        other => {
            return Err(invalid(format!(
                "unsupported format '{}', expected .json or .toml",
                other.unwrap_or("")
            )));
        }
    };

    DomainValidator::validate_schema(&schema).map_err(|e| invalid(e.to_string()))?;
    debug!(
        schema = %schema.name,
        entities = schema.entities.len(),
        "Schema loaded"
    );
    Ok(schema)
}

#[cfg(test)]
mod tests {
    use super::*;
    use codeloom_core::domain::DataType;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn reads_toml_schemas() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("shop.toml");
        fs::write(
            &path,
            r#"
name = "Shop"

[[entities]]
name = "customer"

[[entities.properties]]
name = "id"
type = "integer"
primary_key = true
"#,
        )
        .unwrap();

        let schema = load_schema(&path).unwrap();
        let customer = schema.entity("customer").unwrap();
        assert_eq!(customer.properties[0].data_type, DataType::Integer);
        assert!(customer.properties[0].primary_key);
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = load_schema(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, CliError::SchemaNotFound { .. }));
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn unknown_extension_and_bad_content_are_invalid() {
        let dir = TempDir::new().unwrap();
        let yaml = dir.path().join("shop.yaml");
        fs::write(&yaml, "name: Shop").unwrap();
        assert!(matches!(
            load_schema(&yaml),
            Err(CliError::InvalidSchema { .. })
        ));

        let json = dir.path().join("shop.json");
        fs::write(&json, r#"{ "entities": [] }"#).unwrap();
        let err = load_schema(&json).unwrap_err();
        assert!(err.to_string().contains("name"), "{err}");
    }

    #[test]
    fn duplicate_entities_are_rejected_before_generation() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("shop.json");
        fs::write(
            &path,
            r#"{ "name": "Shop", "entities": [ { "name": "order" }, { "name": "Order" } ] }"#,
        )
        .unwrap();
        let err = load_schema(&path).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("more than once"), "{err}");
    }
}
