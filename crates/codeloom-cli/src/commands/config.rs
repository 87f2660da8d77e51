//! `codeloom config` prints the effective configuration.

use std::path::PathBuf;

use serde_json::Value;

use crate::{
    config::AppConfig,
    cli::ConfigCommands,
    error::{CliError, CliResult},
    output::OutputManager,
};

pub fn execute(
    cmd: ConfigCommands,
    config: AppConfig,
    explicit: Option<PathBuf>,
    output: OutputManager,
) -> CliResult<()> {
    match cmd {
        ConfigCommands::Get { key } => {
            let value = get_config_value(&config, &key)?;
            if output.is_json() {
                output.json(&value)?;
            } else {
                output.print(&display_value(&value))?;
            }
        }

        ConfigCommands::List => {
            if output.is_json() {
                output.json(&config)?;
            } else {
                let serialised =
                    toml::to_string_pretty(&config).map_err(|e| CliError::ConfigError {
                        message: format!("Failed to serialise config: {e}"),
                        source: Some(Box::new(e)),
                    })?;
                output.print(&serialised)?;
            }
        }

        ConfigCommands::Path => {
            output.print(&AppConfig::active_path(explicit.as_deref()).display().to_string())?;
        }
    }

    Ok(())
}

// ── helpers ───────────────────────────────────────────────────────────────────

/// Look up a dotted key such as `templates.exclusions`.
fn get_config_value(config: &AppConfig, key: &str) -> CliResult<Value> {
    let unknown = || CliError::ConfigError {
        message: format!("Unknown config key: '{key}'"),
        source: None,
    };
    let tree = serde_json::to_value(config).map_err(|e| CliError::ConfigError {
        message: format!("Failed to serialise config: {e}"),
        source: Some(Box::new(e)),
    })?;

    key.split('.')
        .try_fold(&tree, |node, part| node.get(part))
        .cloned()
        .ok_or_else(unknown)
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Array(items) => items.iter().map(display_value).collect::<Vec<_>>().join(","),
        other => other.to_string(),
    }
}

// ── tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_known_keys() {
        let cfg = AppConfig::default();
        assert_eq!(
            display_value(&get_config_value(&cfg, "generation.overwrite").unwrap()),
            "always"
        );
        assert_eq!(
            display_value(&get_config_value(&cfg, "output.no_color").unwrap()),
            "false"
        );
        assert_eq!(
            display_value(&get_config_value(&cfg, "generation.namespace").unwrap()),
            ""
        );
    }

    #[test]
    fn sections_are_keys_too() {
        let cfg = AppConfig::default();
        let section = get_config_value(&cfg, "templates").unwrap();
        assert!(section.get("exclusions").is_some());
    }

    #[test]
    fn get_unknown_key_is_error() {
        let cfg = AppConfig::default();
        assert!(matches!(
            get_config_value(&cfg, "generation.colour"),
            Err(CliError::ConfigError { .. })
        ));
        assert!(get_config_value(&cfg, "generation.overwrite.deeper").is_err());
    }
}
