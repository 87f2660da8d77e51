//! Application configuration.
//!
//! [`AppConfig`] is loaded once at startup and passed down by value.  The
//! CLI layer owns config; the core crate only ever sees the
//! [`GenerationSettings`] built from it.
//!
//! # Resolution order (highest priority first)
//!
//! 1. CLI flags (applied by the commands)
//! 2. Environment variables: `CODELOOM_<SECTION>__<KEY>`, e.g.
//!    `CODELOOM_GENERATION__OVERWRITE=never`
//! 3. Config file: `--config FILE`, else `.codeloom.toml` in the current
//!    directory, else the platform config file
//! 4. Built-in defaults

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::debug;

use codeloom_adapters::engines::DEFAULT_EXCLUSIONS;
use codeloom_core::application::{GenerationSettings, OverwritePolicy};

/// File name of a project-local configuration.
pub const LOCAL_CONFIG_FILE: &str = ".codeloom.toml";

const ENV_PREFIX: &str = "CODELOOM";

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub generation: GenerationConfig,
    pub templates: TemplateConfig,
    pub output: OutputConfig,
}

/// Defaults for `codeloom generate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub output_dir: PathBuf,
    pub namespace: Option<String>,
    pub overwrite: OverwritePolicy,
    pub project_template: Option<String>,
    pub entity_template: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateConfig {
    /// User templates; wins over the built-in directory.
    pub user_dir: Option<PathBuf>,
    /// Built-in templates; discovered next to the binary when unset.
    pub builtin_dir: Option<PathBuf>,
    /// Copy built-in files into `user_dir` the first time they are used.
    pub create_missing: bool,
    /// Names or relative paths the folder engine skips.
    pub exclusions: Vec<String>,
    /// Diagram renderer; `{format}` in the arguments becomes the output format.
    pub diagram_program: String,
    pub diagram_args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub no_color: bool,
    pub progress: bool,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        let settings = GenerationSettings::default();
        Self {
            output_dir: settings.output_dir,
            namespace: settings.namespace,
            overwrite: settings.overwrite,
            project_template: settings.project_template,
            entity_template: settings.entity_template,
        }
    }
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            user_dir: None,
            builtin_dir: None,
            create_missing: false,
            exclusions: DEFAULT_EXCLUSIONS.iter().map(|s| s.to_string()).collect(),
            diagram_program: "dot".into(),
            diagram_args: vec!["-T{format}".into()],
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            no_color: false,
            progress: true,
        }
    }
}

impl GenerationConfig {
    /// Settings for the core, before CLI flags are applied.
    pub fn to_settings(&self) -> GenerationSettings {
        GenerationSettings {
            output_dir: self.output_dir.clone(),
            namespace: self.namespace.clone(),
            overwrite: self.overwrite,
            project_template: self.project_template.clone(),
            entity_template: self.entity_template.clone(),
        }
    }
}

impl AppConfig {
    /// Load configuration by layering defaults, the config file and the
    /// environment.
    ///
    /// An explicit `config_file` must exist; the implicit locations are
    /// optional.
    pub fn load(config_file: Option<&PathBuf>) -> anyhow::Result<Self> {
        let defaults =
            Config::try_from(&Self::default()).context("failed to serialise default config")?;
        let mut builder = Config::builder().add_source(defaults);

        match config_file {
            Some(path) => {
                debug!(path = %path.display(), "Loading explicit config file");
                builder = builder.add_source(File::from(path.as_path()).required(true));
            }
            None => {
                let file = Self::active_path(None);
                debug!(path = %file.display(), "Loading config file if present");
                builder = builder.add_source(File::from(file.as_path()).required(false));
            }
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder
            .build()
            .context("failed to read configuration")?
            .try_deserialize()
            .context("invalid configuration")
    }

    /// Path to the platform configuration file.
    ///
    /// Uses `directories::ProjectDirs`, falling back to `.codeloom.toml` in
    /// the current directory.
    pub fn config_path() -> PathBuf {
        directories::ProjectDirs::from("dev", "codeloom", "codeloom")
            .map(|d| d.config_dir().join("config.toml"))
            .unwrap_or_else(|| PathBuf::from(LOCAL_CONFIG_FILE))
    }

    /// The file `load` reads: the explicit one, else a local
    /// `.codeloom.toml` when present, else the platform file.
    pub fn active_path(explicit: Option<&Path>) -> PathBuf {
        if let Some(path) = explicit {
            return path.to_path_buf();
        }
        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.is_file() {
            local
        } else {
            Self::config_path()
        }
    }
}
