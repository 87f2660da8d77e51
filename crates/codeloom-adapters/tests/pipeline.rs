//! End-to-end runs: schema -> orchestrator -> bundled engines -> filesystem.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;

use codeloom_adapters::{
    FsPathResolver, InMemoryRowSource, LocalFilesystem, MemoryFilesystem, default_renderer,
};
use codeloom_core::application::generators;
use codeloom_core::domain::{DatasourceBacked, Row};
use codeloom_core::prelude::*;

fn customer_schema() -> DomainSchema {
    DomainSchema::new("Shop").with_entity(
        EntityDef::new("customer")
            .with_property(PropertyDef::new("id", DataType::Integer).primary_key())
            .with_property(PropertyDef::new("first_name", DataType::String)),
    )
}

fn orchestrator(fs: Arc<dyn Filesystem>, templates: Option<&Path>) -> GenerationOrchestrator {
    let paths = templates.map(|dir| FsPathResolver::new().with_builtin("templates", dir));
    let renderer = default_renderer(paths).unwrap();
    let mut orchestrator = GenerationOrchestrator::new(Arc::new(renderer), fs);
    orchestrator.initialize(generators::builtin());
    orchestrator
}

fn settings(output_dir: impl Into<PathBuf>) -> GenerationSettings {
    GenerationSettings {
        output_dir: output_dir.into(),
        ..GenerationSettings::default()
    }
}

fn paths(result: &GenerationResult) -> Vec<String> {
    result
        .files()
        .iter()
        .map(|f| f.path.to_string_lossy().replace('\\', "/"))
        .collect()
}

#[tokio::test]
async fn customer_entity_becomes_a_csharp_class_on_disk() {
    let out = TempDir::new().unwrap();
    let mut orchestrator = orchestrator(Arc::new(LocalFilesystem::new()), None);

    let result = orchestrator
        .generate(
            customer_schema(),
            settings(out.path()),
            Arc::new(NoopProgress),
            CancellationToken::new(),
        )
        .await;

    assert!(result.is_success(), "{:?}", result.errors());
    let class = fs::read_to_string(out.path().join("Shop/Models/Customer.cs")).unwrap();
    assert!(class.contains("namespace Shop"));
    assert!(class.contains("public class Customer"));
    assert!(class.contains("public int Id { get; set; }"));
    assert!(class.contains("public string FirstName { get; set; }"));

    let project = fs::read_to_string(out.path().join("Shop/Shop.csproj")).unwrap();
    assert!(project.contains("<RootNamespace>Shop</RootNamespace>"));
}

#[tokio::test]
async fn unresolved_special_folder_template_is_reported_not_fatal() {
    let templates = TempDir::new().unwrap();
    let schema = DomainSchema::new("Shop").with_entity(
        EntityDef::new("customer")
            .with_template("@missing/template")
            .with_property(PropertyDef::new("id", DataType::Integer).primary_key()),
    );
    let mut orchestrator = orchestrator(Arc::new(MemoryFilesystem::new()), Some(templates.path()));

    let result = orchestrator
        .preview(schema, settings("/out"), Arc::new(NoopProgress), CancellationToken::new())
        .await;

    assert!(!result.is_success());
    assert!(!result.is_fatal());
    assert!(
        result.errors().iter().any(|e| e.contains("@missing/template")),
        "{:?}",
        result.errors()
    );
    assert!(paths(&result).contains(&"Shop/Shop.csproj".to_string()));
}

#[tokio::test]
async fn preview_has_the_same_shape_as_generate_without_writing() {
    let preview_fs = MemoryFilesystem::new();
    let mut previewer = orchestrator(Arc::new(preview_fs.clone()), None);
    let preview = previewer
        .preview(customer_schema(), settings("/out"), Arc::new(NoopProgress), CancellationToken::new())
        .await;

    let written_fs = MemoryFilesystem::new();
    let mut generator = orchestrator(Arc::new(written_fs.clone()), None);
    let generated = generator
        .generate(customer_schema(), settings("/out"), Arc::new(NoopProgress), CancellationToken::new())
        .await;

    assert!(preview.is_preview());
    assert!(!generated.is_preview());
    assert_eq!(paths(&preview), paths(&generated));
    assert!(preview_fs.list_files().is_empty());
    assert_eq!(written_fs.list_files().len(), generated.files().len());
}

#[tokio::test]
async fn project_template_folder_renders_around_a_broken_file() {
    let templates = TempDir::new().unwrap();
    let web = templates.path().join("web");
    fs::create_dir_all(web.join("Properties")).unwrap();
    fs::write(web.join("Program.cs.tera"), "namespace {{ namespace }};\n").unwrap();
    fs::write(web.join("Broken.cs.tera"), "{{ oops").unwrap();
    fs::write(web.join("Properties/launchSettings.json"), "{}").unwrap();

    let out = TempDir::new().unwrap();
    let mut orchestrator = orchestrator(Arc::new(LocalFilesystem::new()), Some(templates.path()));
    let result = orchestrator
        .generate(
            customer_schema(),
            GenerationSettings {
                project_template: Some("@templates/web".into()),
                ..settings(out.path())
            },
            Arc::new(NoopProgress),
            CancellationToken::new(),
        )
        .await;

    assert!(!result.is_success());
    assert!(result.errors().iter().any(|e| e.contains("Broken.cs.tera")));

    let files = paths(&result);
    assert!(files.contains(&"Shop/Program.cs".to_string()), "{:?}", files);
    assert!(files.contains(&"Shop/Properties/launchSettings.json".to_string()));
    assert!(files.contains(&"Shop/Models/Customer.cs".to_string()));
    assert!(!out.path().join("Shop").exists(), "failed runs must not write");
}

#[tokio::test]
async fn cancelled_run_is_marked_cancelled() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let fs = MemoryFilesystem::new();
    let mut orchestrator = orchestrator(Arc::new(fs.clone()), None);

    let result = orchestrator
        .generate(customer_schema(), settings("/out"), Arc::new(NoopProgress), cancel)
        .await;

    assert!(result.cancelled().is_some());
    assert!(!result.is_success());
    assert!(fs.list_files().is_empty());
}

#[tokio::test]
async fn preview_tables_read_sample_rows() {
    let mut orchestrator = orchestrator(Arc::new(MemoryFilesystem::new()), None);
    orchestrator
        .preview(customer_schema(), settings("/out"), Arc::new(NoopProgress), CancellationToken::new())
        .await;
    let tree = orchestrator.last_tree().unwrap();
    let table = tree
        .walk(tree.root())
        .into_iter()
        .find(|a| a.kind() == ArtifactKind::Table)
        .unwrap();

    let rows = InMemoryRowSource::new().with_table(
        "schema",
        "customer",
        vec![
            Row::new().with("id", 1i64).with("first_name", "Ada"),
            Row::new().with("id", 2i64).with("first_name", "Grace"),
        ],
    );
    let loaded = tree
        .require_decorator::<DatasourceBacked>(table.id())
        .unwrap()
        .load_data(
            tree,
            &rows,
            &tracing::Span::none(),
            Some("grace"),
            10,
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(loaded.len(), 1);
}
