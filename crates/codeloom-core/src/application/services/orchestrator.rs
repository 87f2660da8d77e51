//! Generation orchestrator - the main use case.
//!
//! A run:
//! 1. Validates the schema
//! 2. Bootstraps the artifact tree (workspace, project, datasource, tables)
//! 3. Subscribes every generator to the bus
//! 4. Drains tree events in FIFO order, publishing `ArtifactCreated` for each
//!    added artifact until the queue is empty or the run is cancelled
//! 5. Unsubscribes every generator, whatever the outcome
//! 6. Writes the recorded files (durable runs only)

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::{
    application::{
        ArtifactCreated, GeneratedFile, GenerationResult, GenerationSession, GenerationSettings,
        Generator, GeneratorContext, MessageBus, ProgressEvent, SubscriptionToken,
        TemplateRenderer,
        ports::{Filesystem, ProgressSink},
        services::Materializer,
    },
    domain::{
        ArtifactDraft, ArtifactId, ArtifactKind, ArtifactTree, DomainError, DomainSchema,
        DomainValidator, FileSystemEntry, TreeEvent, naming, props,
    },
    error::CodeloomResult,
};

/// How the last run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Success,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    Idle,
    Running,
    Completed(RunOutcome),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunMode {
    Durable,
    Preview,
}

/// Drives generators over an artifact tree built from a schema.
pub struct GenerationOrchestrator {
    generators: Vec<Arc<dyn Generator>>,
    renderer: Arc<TemplateRenderer>,
    materializer: Materializer,
    bus: MessageBus,
    state: OrchestratorState,
    last_tree: Option<ArtifactTree>,
}

impl GenerationOrchestrator {
    pub fn new(renderer: Arc<TemplateRenderer>, filesystem: Arc<dyn Filesystem>) -> Self {
        Self {
            generators: Vec::new(),
            renderer,
            materializer: Materializer::new(filesystem),
            bus: MessageBus::new(),
            state: OrchestratorState::Idle,
            last_tree: None,
        }
    }

    /// Register generators; they are subscribed in this order on every run.
    pub fn initialize(&mut self, generators: impl IntoIterator<Item = Arc<dyn Generator>>) {
        self.generators.extend(generators);
        info!(generators = self.generators.len(), "Orchestrator initialized");
    }

    pub fn generator_names(&self) -> Vec<&str> {
        self.generators.iter().map(|g| g.name()).collect()
    }

    pub fn state(&self) -> OrchestratorState {
        self.state
    }

    /// The bus generators are subscribed to while a run is in progress.
    pub fn bus(&self) -> &MessageBus {
        &self.bus
    }

    pub fn renderer(&self) -> &Arc<TemplateRenderer> {
        &self.renderer
    }

    /// Tree produced by the most recent run.
    pub fn last_tree(&self) -> Option<&ArtifactTree> {
        self.last_tree.as_ref()
    }

    /// Run generation and write the result to `settings.output_dir`.
    pub async fn generate(
        &mut self,
        schema: DomainSchema,
        settings: GenerationSettings,
        progress: Arc<dyn ProgressSink>,
        cancel: CancellationToken,
    ) -> GenerationResult {
        self.run(schema, settings, progress, cancel, RunMode::Durable)
            .await
    }

    /// Run generation without touching the filesystem.
    pub async fn preview(
        &mut self,
        schema: DomainSchema,
        settings: GenerationSettings,
        progress: Arc<dyn ProgressSink>,
        cancel: CancellationToken,
    ) -> GenerationResult {
        self.run(schema, settings, progress, cancel, RunMode::Preview)
            .await
    }

    #[instrument(skip_all, fields(schema = %schema.name, mode = ?mode))]
    async fn run(
        &mut self,
        schema: DomainSchema,
        settings: GenerationSettings,
        progress: Arc<dyn ProgressSink>,
        cancel: CancellationToken,
        mode: RunMode,
    ) -> GenerationResult {
        let started = Instant::now();
        self.state = OrchestratorState::Running;
        self.last_tree = None;
        info!("Starting generation");
        progress.report(ProgressEvent::percent("bootstrap", "Building artifact tree", 0));

        let mut result = self
            .cascade(schema, settings.clone(), Arc::clone(&progress), cancel, mode)
            .await;

        if mode == RunMode::Durable && result.is_success() {
            if let Some(tree) = &self.last_tree {
                progress.report(ProgressEvent::percent(
                    "write",
                    format!("Writing {} files", result.files().len()),
                    90,
                ));
                self.materializer.write(tree, &settings, &mut result);
            }
        }

        result.set_elapsed(started.elapsed());
        let outcome = if result.is_success() {
            RunOutcome::Success
        } else {
            RunOutcome::Failed
        };
        self.state = OrchestratorState::Completed(outcome);

        progress.report(ProgressEvent::percent(
            "done",
            format!(
                "{} files, {} warnings, {} errors",
                result.files().len(),
                result.warnings().len(),
                result.errors().len()
            ),
            100,
        ));
        info!(
            files = result.files().len(),
            warnings = result.warnings().len(),
            errors = result.errors().len(),
            cancelled = result.cancelled().is_some(),
            elapsed_ms = result.elapsed().as_millis() as u64,
            "Generation finished"
        );
        result
    }

    async fn cascade(
        &mut self,
        schema: DomainSchema,
        settings: GenerationSettings,
        progress: Arc<dyn ProgressSink>,
        cancel: CancellationToken,
        mode: RunMode,
    ) -> GenerationResult {
        let mut result = GenerationResult::new(mode == RunMode::Preview);

        if let Err(e) = DomainValidator::validate_schema(&schema) {
            warn!(error = %e, "Schema rejected");
            result.fatal(e.to_string());
            return result;
        }
        let tree = match bootstrap(&schema, &settings) {
            Ok(tree) => tree,
            Err(e) => {
                result.fatal(e.to_string());
                return result;
            }
        };

        let ctx = GeneratorContext {
            settings,
            schema,
            renderer: Arc::clone(&self.renderer),
            cancel: cancel.clone(),
            progress: Arc::clone(&progress),
        };
        let session = GenerationSession::new(tree, ctx, result);

        let registrations: Vec<(Arc<dyn Generator>, Vec<SubscriptionToken>)> = self
            .generators
            .iter()
            .map(|g| (Arc::clone(g), Arc::clone(g).subscribe_to_events(&self.bus, &session)))
            .collect();
        debug!(subscribers = self.bus.total_subscribers(), "Generators subscribed");

        let mut files = Vec::new();
        let drained = self
            .drain(&session, &cancel, progress.as_ref(), &mut files)
            .await;

        for (generator, tokens) in &registrations {
            generator.unsubscribe_from_events(&self.bus, tokens);
        }

        let (tree, mut result) = session.finish().await;
        for id in files {
            if let Some(file) = generated_file(&tree, id) {
                result.add_file(file);
            }
        }
        if let Err(e) = drained {
            warn!(error = %e, "Generation aborted");
            result.fatal(e.to_string());
        }
        self.last_tree = Some(tree);
        result
    }

    /// Publish tree events until none are left, recording file artifacts in
    /// the order they were added.
    async fn drain(
        &self,
        session: &GenerationSession,
        cancel: &CancellationToken,
        progress: &dyn ProgressSink,
        files: &mut Vec<ArtifactId>,
    ) -> CodeloomResult<()> {
        let mut queue: VecDeque<ArtifactCreated> = VecDeque::new();
        let mut dispatched = 0usize;

        loop {
            {
                let mut tree = session.tree().lock().await;
                for event in tree.drain_events() {
                    match event {
                        TreeEvent::RootCreated { root, kind } => {
                            queue.extend(created(&tree, root, None, kind));
                        }
                        TreeEvent::ChildAdded {
                            parent,
                            child,
                            kind,
                        } => {
                            if kind.is_file() {
                                files.push(child);
                            }
                            queue.extend(created(&tree, child, Some(parent), kind));
                        }
                        TreeEvent::ChildRemoved { child, .. } => {
                            debug!(artifact = %child, "Artifact removed");
                            files.retain(|id| tree.contains(*id));
                        }
                        _ => {}
                    }
                }
            }

            if cancel.is_cancelled() {
                warn!(dispatched, pending = queue.len(), "Generation cancelled");
                session.with_result(|r| r.cancel("generation cancelled"));
                return Ok(());
            }

            let Some(event) = queue.pop_front() else {
                debug!(dispatched, "Event queue drained");
                return Ok(());
            };

            dispatched += 1;
            progress.report(ProgressEvent::indeterminate(
                "generate",
                format!("{} {}", event.kind, event.label),
            ));
            self.bus.publish(event).await?;
        }
    }
}

fn created(
    tree: &ArtifactTree,
    id: ArtifactId,
    parent: Option<ArtifactId>,
    kind: ArtifactKind,
) -> Option<ArtifactCreated> {
    let artifact = tree.get(id)?;
    Some(ArtifactCreated {
        artifact: id,
        parent,
        kind,
        label: artifact.label().to_string(),
    })
}

fn generated_file(tree: &ArtifactTree, id: ArtifactId) -> Option<GeneratedFile> {
    let artifact = tree.get(id)?;
    Some(GeneratedFile {
        artifact: id,
        path: tree.path_of(id)?,
        kind: artifact.kind(),
        size: artifact.content().map(|c| c.len()),
    })
}

/// Initial tree: Workspace > Project > Datasource > Table > Column.
fn bootstrap(schema: &DomainSchema, settings: &GenerationSettings) -> Result<ArtifactTree, DomainError> {
    let namespace = settings
        .namespace
        .clone()
        .or_else(|| schema.namespace.clone())
        .unwrap_or_else(|| naming::to_pascal_case(&schema.name));

    let tables = schema.entities.iter().map(|entity| {
        let columns = entity.properties.iter().map(|p| {
            ArtifactDraft::new(ArtifactKind::Column, &p.name)
                .with_property(props::DATA_TYPE, p.data_type.as_str())
                .with_property(props::PRIMARY_KEY, p.primary_key)
                .with_property(props::NULLABLE, p.nullable)
        });
        let mut table = ArtifactDraft::new(ArtifactKind::Table, &entity.name).with_children(columns);
        if let Some(template) = &entity.template {
            table = table.with_property(props::TEMPLATE, template.as_str());
        }
        table
    });

    let datasource = ArtifactDraft::new(ArtifactKind::Datasource, "schema").with_children(tables);
    let project = ArtifactDraft::new(ArtifactKind::Project, &schema.name)
        .with_property(props::NAMESPACE, namespace)
        .with_decorator(FileSystemEntry::new(settings.output_dir.join(&schema.name)))
        .with_child(datasource);

    ArtifactTree::new(ArtifactDraft::new(ArtifactKind::Workspace, &schema.name).with_child(project))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::generators;
    use crate::application::ports::MockFilesystem;
    use crate::application::test_support::{FakeStore, RecordingProgress, echo_renderer};
    use crate::application::{NoopProgress, Reaction};
    use crate::domain::{DataType, EntityDef, PropertyDef, Template, TemplateId};
    use async_trait::async_trait;
    use std::path::PathBuf;

    fn store() -> FakeStore {
        FakeStore::default()
            .with(Template::inline(TemplateId::parse("entity-class").unwrap(), "echo", ""))
            .with(Template::inline(TemplateId::parse("project-file").unwrap(), "echo", ""))
    }

    fn shop() -> DomainSchema {
        DomainSchema::new("Shop")
            .with_entity(
                EntityDef::new("customer")
                    .with_property(PropertyDef::new("id", DataType::Integer).primary_key())
                    .with_property(PropertyDef::new("first_name", DataType::String)),
            )
            .with_entity(
                EntityDef::new("order").with_property(PropertyDef::new("id", DataType::Integer)),
            )
    }

    fn settings() -> GenerationSettings {
        GenerationSettings {
            output_dir: PathBuf::from("/out"),
            ..GenerationSettings::default()
        }
    }

    fn orchestrator(store: FakeStore, fs: MockFilesystem) -> GenerationOrchestrator {
        let mut orchestrator = GenerationOrchestrator::new(echo_renderer(store), Arc::new(fs));
        orchestrator.initialize(generators::builtin());
        orchestrator
    }

    fn untouched_fs() -> MockFilesystem {
        let mut fs = MockFilesystem::new();
        fs.expect_write_file().never();
        fs.expect_create_dir_all().never();
        fs
    }

    #[tokio::test]
    async fn preview_runs_the_whole_cascade_without_writing() {
        let mut orchestrator = orchestrator(store(), untouched_fs());
        let result = orchestrator
            .preview(shop(), settings(), Arc::new(NoopProgress), CancellationToken::new())
            .await;

        assert!(result.is_success(), "{:?}", result.errors());
        assert!(result.is_preview());
        let paths: Vec<_> = result.files().iter().map(|f| f.path.clone()).collect();
        assert_eq!(
            paths,
            [
                PathBuf::from("Shop/Shop.csproj"),
                PathBuf::from("Shop/Models/Customer.cs"),
                PathBuf::from("Shop/Models/Order.cs"),
            ]
        );
        assert_eq!(orchestrator.state(), OrchestratorState::Completed(RunOutcome::Success));
        assert_eq!(orchestrator.bus().total_subscribers(), 0);

        let tree = orchestrator.last_tree().unwrap();
        let entities = tree
            .walk(tree.root())
            .into_iter()
            .filter(|a| a.kind() == ArtifactKind::Entity)
            .count();
        assert_eq!(entities, 2);
    }

    #[tokio::test]
    async fn generate_writes_recorded_files() {
        let mut fs = MockFilesystem::new();
        fs.expect_exists().returning(|_| false);
        fs.expect_create_dir_all().returning(|_| Ok(()));
        fs.expect_write_file().times(3).returning(|_, _| Ok(()));

        let mut orchestrator = orchestrator(store(), fs);
        let result = orchestrator
            .generate(shop(), settings(), Arc::new(NoopProgress), CancellationToken::new())
            .await;
        assert!(result.is_success(), "{:?}", result.errors());
        assert!(!result.is_preview());
    }

    #[tokio::test]
    async fn invalid_schema_is_fatal_before_any_generator_runs() {
        let mut orchestrator = orchestrator(store(), untouched_fs());
        let schema = DomainSchema::new("Shop")
            .with_entity(EntityDef::new("a"))
            .with_entity(EntityDef::new("A"));
        let result = orchestrator
            .generate(schema, settings(), Arc::new(NoopProgress), CancellationToken::new())
            .await;

        assert!(result.is_fatal());
        assert!(result.files().is_empty());
        assert_eq!(orchestrator.state(), OrchestratorState::Completed(RunOutcome::Failed));
    }

    #[tokio::test]
    async fn template_failures_are_recorded_and_block_writing() {
        let store = FakeStore::default()
            .with(Template::inline(TemplateId::parse("project-file").unwrap(), "echo", ""));
        let mut orchestrator = orchestrator(store, untouched_fs());
        let result = orchestrator
            .generate(shop(), settings(), Arc::new(NoopProgress), CancellationToken::new())
            .await;

        assert!(!result.is_fatal());
        assert_eq!(result.errors().len(), 2);
        assert!(result.errors()[0].starts_with("entity-class: entity 'Customer'"));
        assert_eq!(result.files().len(), 1);
    }

    #[tokio::test]
    async fn cancellation_stops_publishing_and_keeps_partial_tree() {
        let mut orchestrator = orchestrator(store(), untouched_fs());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = orchestrator
            .generate(shop(), settings(), Arc::new(NoopProgress), cancel)
            .await;
        assert_eq!(result.cancelled(), Some("generation cancelled"));
        assert!(result.errors().is_empty());
        assert!(result.files().is_empty());
        assert!(orchestrator.last_tree().is_some());
        assert_eq!(orchestrator.bus().total_subscribers(), 0);
    }

    struct Exploding;

    #[async_trait]
    impl Generator for Exploding {
        fn name(&self) -> &str {
            "exploding"
        }

        fn accepts(&self, event: &ArtifactCreated) -> bool {
            event.kind == ArtifactKind::Table
        }

        async fn react(
            &self,
            _event: &ArtifactCreated,
            _tree: &ArtifactTree,
            _ctx: &GeneratorContext,
        ) -> CodeloomResult<Reaction> {
            Err(DomainError::InvalidSchema("kaboom".into()).into())
        }
    }

    #[tokio::test]
    async fn generator_error_aborts_run_and_unsubscribes() {
        let mut orchestrator = GenerationOrchestrator::new(echo_renderer(store()), Arc::new(untouched_fs()));
        orchestrator.initialize([Arc::new(Exploding) as Arc<dyn Generator>]);

        let result = orchestrator
            .generate(shop(), settings(), Arc::new(NoopProgress), CancellationToken::new())
            .await;
        assert!(result.is_fatal());
        assert!(result.errors()[0].contains("kaboom"));
        assert_eq!(orchestrator.bus().total_subscribers(), 0);

        // The orchestrator is reusable after a failed run.
        let result = orchestrator
            .preview(DomainSchema::new("Empty"), settings(), Arc::new(NoopProgress), CancellationToken::new())
            .await;
        assert!(result.is_success());
    }

    #[tokio::test]
    async fn progress_is_reported_from_bootstrap_to_done() {
        let progress = Arc::new(RecordingProgress::default());
        let mut orchestrator = orchestrator(store(), untouched_fs());
        orchestrator
            .preview(shop(), settings(), progress.clone(), CancellationToken::new())
            .await;

        let events = progress.events.lock().unwrap();
        assert_eq!(events.first().unwrap().step, "bootstrap");
        assert_eq!(events.last().unwrap().step, "done");
        assert!(events.iter().any(|e| e.step == "generate"));
    }

    #[tokio::test]
    async fn entity_template_override_is_used() {
        let store = FakeStore::default()
            .with(Template::inline(TemplateId::parse("project-file").unwrap(), "echo", ""))
            .with(Template::inline(TemplateId::parse("record").unwrap(), "echo", ""));
        let schema = DomainSchema::new("Billing").with_entity(
            EntityDef::new("invoice")
                .with_template("record")
                .with_property(PropertyDef::new("total", DataType::Decimal)),
        );
        let mut orchestrator = orchestrator(store, untouched_fs());

        let result = orchestrator
            .preview(schema, settings(), Arc::new(NoopProgress), CancellationToken::new())
            .await;
        assert!(result.is_success(), "{:?}", result.errors());
        assert_eq!(
            result.files().last().unwrap().path,
            PathBuf::from("Billing/Models/Invoice.cs")
        );
    }
}
