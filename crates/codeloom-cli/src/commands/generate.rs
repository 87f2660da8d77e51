//! Implementation of the `codeloom generate` command.
//!
//! Loads the schema, merges flags over the `[generation]` config, wires the
//! adapters into a [`GenerationOrchestrator`] and reports the result.

use std::path::Path;
use std::sync::Arc;

use tracing::{info, instrument};

use codeloom_adapters::{LocalFilesystem, build_renderer};
use codeloom_core::CancellationToken;
use codeloom_core::application::{GenerationOrchestrator, GenerationSettings, generators};
use codeloom_core::domain::DomainSchema;

use crate::{
    cli::{GenerateArgs, GlobalArgs},
    config::AppConfig,
    error::{CliError, CliResult, IntoCli},
    output::OutputManager,
    progress::ProgressReporter,
    schema::load_schema,
};

#[instrument(skip_all, fields(schema = %args.schema.display(), preview = args.preview))]
pub async fn execute(
    args: GenerateArgs,
    global: GlobalArgs,
    config: AppConfig,
    output: OutputManager,
    cancel: CancellationToken,
) -> CliResult<()> {
    let schema = load_schema(&args.schema)?;
    let settings = settings_for(&args, &config);

    let project_dir = settings.output_dir.join(&schema.name);
    let ask = !args.preview && !args.yes && !global.quiet && project_dir.exists();
    if ask && !confirm_existing(&project_dir, &settings)? {
        return Err(CliError::Cancelled);
    }

    let paths = super::path_resolver(args.templates.clone(), &config.templates);
    let renderer = build_renderer(super::engines(&config.templates), Some(paths))
        .with_cli_context(|| "building the template renderer")?;

    let mut orchestrator =
        GenerationOrchestrator::new(Arc::new(renderer), Arc::new(LocalFilesystem::new()));
    orchestrator.initialize(generators::builtin());

    let progress = Arc::new(ProgressReporter::new(
        config.output.progress && !global.quiet && !output.is_json(),
    ));
    output.header(&header(&schema, &settings, args.preview))?;
    info!(
        output_dir = %settings.output_dir.display(),
        overwrite = %settings.overwrite,
        "Generation started"
    );

    let result = if args.preview {
        orchestrator
            .preview(schema, settings, progress.clone(), cancel)
            .await
    } else {
        orchestrator
            .generate(schema, settings, progress.clone(), cancel)
            .await
    };
    progress.finish();

    info!(
        files = result.files().len(),
        errors = result.errors().len(),
        elapsed_ms = result.elapsed().as_millis() as u64,
        "Generation finished"
    );
    output.report(&result)?;

    if result.cancelled().is_some() {
        Err(CliError::Cancelled)
    } else if !result.is_success() {
        Err(CliError::GenerationFailed {
            errors: result.errors().len(),
        })
    } else {
        Ok(())
    }
}

/// `[generation]` config with command-line flags applied on top.
fn settings_for(args: &GenerateArgs, config: &AppConfig) -> GenerationSettings {
    let mut settings = config.generation.to_settings();
    if let Some(dir) = &args.output {
        settings.output_dir = dir.clone();
    }
    if let Some(namespace) = &args.namespace {
        settings.namespace = Some(namespace.clone());
    }
    if let Some(overwrite) = args.overwrite {
        settings.overwrite = overwrite.into();
    }
    if let Some(template) = &args.project_template {
        settings.project_template = Some(template.clone());
    }
    if let Some(template) = &args.entity_template {
        settings.entity_template = template.clone();
    }
    settings
}

fn header(schema: &DomainSchema, settings: &GenerationSettings, preview: bool) -> String {
    let action = if preview { "Previewing" } else { "Generating" };
    format!(
        "{action} '{}' ({} entities) into {}",
        schema.name,
        schema.entities.len(),
        settings.output_dir.display()
    )
}

#[cfg(feature = "interactive")]
fn confirm_existing(project_dir: &Path, settings: &GenerationSettings) -> CliResult<bool> {
    use std::io::IsTerminal as _;

    if !std::io::stdin().is_terminal() {
        return Ok(true);
    }
    dialoguer::Confirm::new()
        .with_prompt(format!(
            "'{}' already exists; write into it (overwrite: {})?",
            project_dir.display(),
            settings.overwrite
        ))
        .default(false)
        .interact()
        .map_err(|e| CliError::InvalidInput {
            message: format!("confirmation prompt failed: {e}"),
            source: Some(Box::new(e)),
        })
}

#[cfg(not(feature = "interactive"))]
fn confirm_existing(_project_dir: &Path, _settings: &GenerationSettings) -> CliResult<bool> {
    Ok(true)
}
