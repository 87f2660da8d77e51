//! Integration tests for codeloom-core, driven only through the public API.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use codeloom_core::application::generators;
use codeloom_core::prelude::*;

#[derive(Default)]
struct Store(Mutex<HashMap<TemplateId, Template>>);

impl TemplateStore for Store {
    fn get(&self, id: &TemplateId) -> CodeloomResult<Template> {
        self.0.lock().unwrap().get(id).cloned().ok_or_else(|| {
            codeloom_core::application::ApplicationError::TemplateResolution {
                id: id.to_string(),
                reason: "unknown".into(),
            }
            .into()
        })
    }

    fn list(&self) -> CodeloomResult<Vec<Template>> {
        Ok(self.0.lock().unwrap().values().cloned().collect())
    }

    fn insert(&self, template: Template) -> CodeloomResult<()> {
        self.0.lock().unwrap().insert(template.id().clone(), template);
        Ok(())
    }

    fn remove(&self, id: &TemplateId) -> CodeloomResult<()> {
        self.0.lock().unwrap().remove(id);
        Ok(())
    }
}

/// Writes `<name>: <entity or project>` into a single file.
struct Stamp;

#[async_trait]
impl TemplateEngine for Stamp {
    fn name(&self) -> &'static str {
        "stamp"
    }

    fn extensions(&self) -> &[&'static str] {
        &["stamp"]
    }

    async fn render(
        &self,
        instance: &TemplateInstance,
        _scope: &RenderScope<'_>,
        _cancel: &CancellationToken,
    ) -> TemplateOutput {
        let subject = instance
            .parameter_str("entity")
            .or_else(|| instance.parameter_str("project"))
            .unwrap_or("?");
        let text = format!("{}: {}", instance.template().id(), subject);
        TemplateOutput::success(vec![ArtifactDraft::file(
            instance.resolved_file_name(),
            ArtifactContent::Text(text),
        )])
    }
}

#[derive(Default)]
struct RecordingFs(Mutex<HashMap<PathBuf, Vec<u8>>>);

impl Filesystem for RecordingFs {
    fn create_dir_all(&self, _path: &Path) -> CodeloomResult<()> {
        Ok(())
    }

    fn write_file(&self, path: &Path, content: &[u8]) -> CodeloomResult<()> {
        self.0.lock().unwrap().insert(path.to_path_buf(), content.to_vec());
        Ok(())
    }

    fn read_file(&self, path: &Path) -> CodeloomResult<Vec<u8>> {
        Ok(self.0.lock().unwrap().get(path).cloned().unwrap_or_default())
    }

    fn copy_file(&self, from: &Path, to: &Path) -> CodeloomResult<()> {
        let content = self.read_file(from)?;
        self.write_file(to, &content)
    }

    fn exists(&self, path: &Path) -> bool {
        self.0.lock().unwrap().contains_key(path)
    }

    fn remove_file(&self, path: &Path) -> CodeloomResult<()> {
        self.0.lock().unwrap().remove(path);
        Ok(())
    }

    fn remove_dir_all(&self, path: &Path) -> CodeloomResult<()> {
        self.0.lock().unwrap().retain(|p, _| !p.starts_with(path));
        Ok(())
    }
}

fn renderer() -> Arc<TemplateRenderer> {
    let store = Store::default();
    for id in ["entity-class", "project-file"] {
        store
            .insert(Template::inline(TemplateId::parse(id).unwrap(), "stamp", ""))
            .unwrap();
    }
    let resolver = TemplateResolver::new(Arc::new(store));
    let engines = EngineRegistry::new().with(Arc::new(Stamp));
    Arc::new(TemplateRenderer::new(resolver, engines))
}

fn schema() -> DomainSchema {
    DomainSchema::new("Crm").with_namespace("Acme.Crm").with_entity(
        EntityDef::new("contact")
            .with_property(PropertyDef::new("id", DataType::Uuid).primary_key())
            .with_property(PropertyDef::new("email", DataType::String).nullable()),
    )
}

#[tokio::test]
async fn generate_writes_project_and_entity_files() {
    let fs = Arc::new(RecordingFs::default());
    let mut orchestrator = GenerationOrchestrator::new(renderer(), fs.clone());
    orchestrator.initialize(generators::builtin());

    let settings = GenerationSettings {
        output_dir: PathBuf::from("/work"),
        ..GenerationSettings::default()
    };
    let result = orchestrator
        .generate(schema(), settings, Arc::new(NoopProgress), CancellationToken::new())
        .await;

    assert!(result.is_success(), "{:?}", result.errors());
    let written = fs.0.lock().unwrap();
    assert_eq!(
        written.get(Path::new("/work/Crm/Models/Contact.cs")).map(Vec::as_slice),
        Some(b"entity-class: Contact".as_slice())
    );
    assert!(written.contains_key(Path::new("/work/Crm/Crm.csproj")));
}

/// A third-party generator reacting to the same events as the built-ins.
struct ReadmeGenerator;

#[async_trait]
impl Generator for ReadmeGenerator {
    fn name(&self) -> &str {
        "readme"
    }

    fn accepts(&self, event: &ArtifactCreated) -> bool {
        event.kind == ArtifactKind::Entity
    }

    async fn react(
        &self,
        event: &ArtifactCreated,
        tree: &ArtifactTree,
        _ctx: &GeneratorContext,
    ) -> CodeloomResult<Reaction> {
        let mut reaction = Reaction::none();
        if let Some(project) = tree.find_ancestor_of_kind(event.artifact, ArtifactKind::Project) {
            reaction.attach(
                project.id(),
                ArtifactDraft::file(
                    format!("{}.md", event.label),
                    ArtifactContent::Text(format!("# {}\n", event.label)),
                ),
            );
        }
        Ok(reaction)
    }
}

#[tokio::test]
async fn custom_generators_join_the_cascade() {
    let mut orchestrator = GenerationOrchestrator::new(renderer(), Arc::new(RecordingFs::default()));
    orchestrator.initialize(generators::builtin());
    orchestrator.initialize([Arc::new(ReadmeGenerator) as Arc<dyn Generator>]);

    let result = orchestrator
        .preview(schema(), GenerationSettings::default(), Arc::new(NoopProgress), CancellationToken::new())
        .await;

    assert!(result.is_success());
    let names: Vec<_> = result
        .files()
        .iter()
        .map(|f| f.path.to_string_lossy().replace('\\', "/"))
        .collect();
    assert!(names.contains(&"Crm/Contact.md".to_string()), "{:?}", names);
    assert!(names.contains(&"Crm/Models/Contact.cs".to_string()), "{:?}", names);
}

#[tokio::test]
async fn preview_tree_survives_a_memento_round_trip() {
    let mut orchestrator = GenerationOrchestrator::new(renderer(), Arc::new(RecordingFs::default()));
    orchestrator.initialize(generators::builtin());
    orchestrator
        .preview(schema(), GenerationSettings::default(), Arc::new(NoopProgress), CancellationToken::new())
        .await;

    let tree = orchestrator.last_tree().unwrap();
    let state: ArtifactState = tree.capture(tree.root()).unwrap();
    let json = serde_json::to_string(&state).unwrap();
    let restored = ArtifactTree::restore(&serde_json::from_str(&json).unwrap()).unwrap();

    assert_eq!(restored.len(), tree.len());
    assert_eq!(restored.pending_events(), 0);
}
