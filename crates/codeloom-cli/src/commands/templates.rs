//! Implementation of the `codeloom templates` command.

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::debug;

use codeloom_adapters::resolver::TEMPLATES_FOLDER;
use codeloom_adapters::template_loader::scan_folder;
use codeloom_adapters::{FsPathResolver, InMemoryStore};
use codeloom_core::application::{EngineRegistry, ports::TemplateStore};
use codeloom_core::domain::Template;

use crate::{
    cli::{GlobalArgs, TemplatesArgs},
    config::AppConfig,
    error::{CliResult, IntoCli},
    output::OutputManager,
};

/// One row of the listing.
#[derive(Debug, Serialize)]
struct TemplateEntry {
    id: String,
    engine: String,
    origin: &'static str,
    description: Option<String>,
    parameters: Vec<String>,
}

impl TemplateEntry {
    fn from_template(template: &Template, origin: &'static str) -> Self {
        Self {
            id: template.id().to_string(),
            engine: template.engine_key().unwrap_or("folder").to_string(),
            origin,
            description: template.description().map(str::to_string),
            parameters: template
                .definition()
                .map(|d| d.parameters.iter().map(|p| p.name.clone()).collect())
                .unwrap_or_default(),
        }
    }
}

pub fn execute(
    args: TemplatesArgs,
    _global: GlobalArgs,
    config: AppConfig,
    output: OutputManager,
) -> CliResult<()> {
    let store = InMemoryStore::with_builtin().with_cli_context(|| "loading built-in templates")?;
    let engines = super::engines(&config.templates);
    let paths = super::path_resolver(args.templates, &config.templates);
    let entries = collect(&store, &paths, &engines)?;

    if output.is_json() {
        output.json(&entries)?;
        return Ok(());
    }
    if args.ids_only {
        for entry in &entries {
            output.print(&entry.id)?;
        }
        return Ok(());
    }

    output.header("Available templates:")?;
    for entry in &entries {
        let description = entry.description.as_deref().unwrap_or("");
        output.print(&format!(
            "  {:<40} {:<8} {:<8} {}",
            entry.id, entry.engine, entry.origin, description
        ))?;
    }
    if entries.iter().all(|e| e.origin == "builtin") {
        output.info("No template folders found; pass --templates DIR to list your own")?;
    }
    Ok(())
}

/// Store templates first, then folder templates with user files shadowing
/// built-in ones of the same id.
fn collect(
    store: &InMemoryStore,
    paths: &FsPathResolver,
    engines: &EngineRegistry,
) -> CliResult<Vec<TemplateEntry>> {
    let mut entries: Vec<TemplateEntry> = store
        .list()
        .with_cli_context(|| "listing built-in templates")?
        .iter()
        .map(|t| TemplateEntry::from_template(t, "builtin"))
        .collect();

    let mut seen = BTreeSet::new();
    for root in paths.roots(TEMPLATES_FOLDER) {
        debug!(root = %root.display(), "Scanning template folder");
        for template in scan_folder(TEMPLATES_FOLDER, root, engines) {
            if seen.insert(template.id().to_string()) {
                entries.push(TemplateEntry::from_template(&template, "folder"));
            }
        }
    }
    Ok(entries)
}
