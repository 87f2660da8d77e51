//! Generator contract and the per-run session generators write through.
//!
//! A generator never touches the tree directly. It inspects the tree, renders
//! templates and returns a [`Reaction`]; the [`GenerationSession`] applies the
//! reaction's attachments and records its diagnostics.

use async_trait::async_trait;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, trace};

use crate::application::{
    ApplicationError, ArtifactCreated, GenerationResult, GenerationSettings, MessageBus,
    SubscriptionToken, TemplateRenderer, ports::ProgressSink,
};
use crate::domain::{
    Artifact, ArtifactDraft, ArtifactId, ArtifactTree, DomainSchema, TemplateOutput, naming, props,
};
use crate::error::CodeloomResult;

/// Read-only inputs shared by every generator during one run.
pub struct GeneratorContext {
    pub settings: GenerationSettings,
    pub schema: DomainSchema,
    pub renderer: Arc<TemplateRenderer>,
    pub cancel: CancellationToken,
    pub progress: Arc<dyn ProgressSink>,
}

impl GeneratorContext {
    /// Namespace for code generated inside `project`.
    pub fn namespace_for(&self, project: &Artifact) -> String {
        project
            .text(props::NAMESPACE)
            .map(str::to_string)
            .or_else(|| self.settings.namespace.clone())
            .or_else(|| self.schema.namespace.clone())
            .unwrap_or_else(|| naming::to_pascal_case(&self.schema.name))
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// A draft to attach under an existing artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub parent: ArtifactId,
    pub draft: ArtifactDraft,
}

/// What a generator wants done in response to one event.
#[derive(Debug, Default)]
pub struct Reaction {
    pub attachments: Vec<Attachment>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl Reaction {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn attach(&mut self, parent: ArtifactId, draft: ArtifactDraft) {
        self.attachments.push(Attachment { parent, draft });
    }

    pub fn warn(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    pub fn error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
    }

    pub fn is_empty(&self) -> bool {
        self.attachments.is_empty() && self.warnings.is_empty() && self.errors.is_empty()
    }

    /// Fold a template output in: artifacts go under `parent`, diagnostics
    /// are prefixed with `source`.
    pub fn absorb(&mut self, parent: ArtifactId, output: TemplateOutput, source: &str) {
        let (artifacts, warnings, errors) = output.into_parts();
        for draft in artifacts {
            self.attach(parent, draft);
        }
        self.warnings
            .extend(warnings.into_iter().map(|w| format!("{}: {}", source, w)));
        self.errors
            .extend(errors.into_iter().map(|e| format!("{}: {}", source, e)));
    }
}

/// A unit of generation logic reacting to [`ArtifactCreated`] events.
///
/// Returning `Err` is fatal for the whole run; recoverable problems belong in
/// [`Reaction::errors`] or [`Reaction::warnings`].
///
/// The session holds the tree for the whole of `react`. A generator must not
/// publish on the run's bus from inside `react`: follow-up work goes into the
/// returned [`Reaction`], whose attachments raise their own events. A nested
/// dispatch fails with [`ApplicationError::ReentrantDispatch`].
#[async_trait]
pub trait Generator: Send + Sync + 'static {
    fn name(&self) -> &str;

    /// Cheap filter evaluated before `react` is scheduled.
    fn accepts(&self, event: &ArtifactCreated) -> bool;

    async fn react(
        &self,
        event: &ArtifactCreated,
        tree: &ArtifactTree,
        ctx: &GeneratorContext,
    ) -> CodeloomResult<Reaction>;

    /// Register this generator on `bus` for the duration of `session`.
    fn subscribe_to_events(
        self: Arc<Self>,
        bus: &MessageBus,
        session: &GenerationSession,
    ) -> Vec<SubscriptionToken> {
        let filter = Arc::clone(&self);
        let session = session.clone();
        let token = bus.subscribe_filtered(
            move |event: Arc<ArtifactCreated>| {
                let generator = Arc::clone(&self);
                let session = session.clone();
                async move { session.dispatch(generator.as_ref(), &event).await }
            },
            move |event: &ArtifactCreated| filter.accepts(event),
        );
        vec![token]
    }

    fn unsubscribe_from_events(&self, bus: &MessageBus, tokens: &[SubscriptionToken]) {
        for token in tokens {
            bus.unsubscribe(*token);
        }
    }
}

/// Shared state of one generation run. Clones refer to the same run.
#[derive(Clone)]
pub struct GenerationSession {
    tree: Arc<AsyncMutex<ArtifactTree>>,
    result: Arc<Mutex<GenerationResult>>,
    ctx: Arc<GeneratorContext>,
}

impl GenerationSession {
    pub(crate) fn new(tree: ArtifactTree, ctx: GeneratorContext, result: GenerationResult) -> Self {
        Self {
            tree: Arc::new(AsyncMutex::new(tree)),
            result: Arc::new(Mutex::new(result)),
            ctx: Arc::new(ctx),
        }
    }

    pub fn context(&self) -> &GeneratorContext {
        &self.ctx
    }

    pub(crate) fn tree(&self) -> &AsyncMutex<ArtifactTree> {
        &self.tree
    }

    pub(crate) fn with_result<R>(&self, f: impl FnOnce(&mut GenerationResult) -> R) -> R {
        let mut result = self.result.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut result)
    }

    /// Run `generator` against `event` and apply its reaction.
    #[instrument(skip_all, fields(generator = generator.name(), artifact = %event.artifact))]
    pub async fn dispatch<G: Generator + ?Sized>(
        &self,
        generator: &G,
        event: &ArtifactCreated,
    ) -> CodeloomResult<()> {
        if self.ctx.is_cancelled() {
            return Ok(());
        }

        let Ok(mut tree) = self.tree.try_lock() else {
            return Err(ApplicationError::ReentrantDispatch {
                generator: generator.name().to_string(),
            }
            .into());
        };
        if !tree.contains(event.artifact) {
            debug!("Artifact removed before dispatch");
            return Ok(());
        }

        let reaction = match generator.react(event, &tree, &self.ctx).await {
            Ok(reaction) => reaction,
            Err(e) if e.is_cancelled() => {
                debug!("Generator observed cancellation");
                return Ok(());
            }
            Err(e) => {
                return Err(ApplicationError::GeneratorFailed {
                    generator: generator.name().to_string(),
                    reason: e.to_string(),
                }
                .into());
            }
        };

        let Reaction {
            attachments,
            warnings,
            errors,
        } = reaction;

        self.with_result(|result| {
            for warning in warnings {
                result.warn(format!("{}: {}", generator.name(), warning));
            }
            for error in errors {
                result.error(format!("{}: {}", generator.name(), error));
            }
        });

        for Attachment { parent, draft } in attachments {
            let id = tree.add_child(parent, draft)?;
            trace!(child = %id, parent = %parent, "Attached");
        }
        Ok(())
    }

    /// Hand back the final tree and result.
    pub(crate) async fn finish(self) -> (ArtifactTree, GenerationResult) {
        let result = self.with_result(std::mem::take);
        let tree = match Arc::try_unwrap(self.tree) {
            Ok(tree) => tree.into_inner(),
            Err(shared) => shared.lock().await.clone(),
        };
        (tree, result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::NoopProgress;
    use crate::application::test_support::{FakeStore, echo_renderer};
    use crate::domain::{ArtifactContent, ArtifactKind, DomainError};

    struct Labeler {
        fail: bool,
    }

    #[async_trait]
    impl Generator for Labeler {
        fn name(&self) -> &str {
            "labeler"
        }

        fn accepts(&self, event: &ArtifactCreated) -> bool {
            event.kind == ArtifactKind::Project
        }

        async fn react(
            &self,
            event: &ArtifactCreated,
            _tree: &ArtifactTree,
            _ctx: &GeneratorContext,
        ) -> CodeloomResult<Reaction> {
            if self.fail {
                return Err(DomainError::InvalidSchema("bad".into()).into());
            }
            let mut reaction = Reaction::none();
            reaction.attach(event.artifact, ArtifactDraft::folder("Models"));
            reaction.warn("heads up");
            Ok(reaction)
        }
    }

    fn session() -> (GenerationSession, ArtifactId) {
        let mut tree = ArtifactTree::new(ArtifactDraft::new(ArtifactKind::Workspace, "ws")).unwrap();
        let project = tree
            .add_child(tree.root(), ArtifactDraft::new(ArtifactKind::Project, "Shop"))
            .unwrap();
        tree.drain_events();
        let ctx = GeneratorContext {
            settings: GenerationSettings::default(),
            schema: DomainSchema::new("shop"),
            renderer: echo_renderer(FakeStore::default()),
            cancel: CancellationToken::new(),
            progress: Arc::new(NoopProgress),
        };
        (
            GenerationSession::new(tree, ctx, GenerationResult::new(false)),
            project,
        )
    }

    fn created(id: ArtifactId) -> ArtifactCreated {
        ArtifactCreated {
            artifact: id,
            parent: None,
            kind: ArtifactKind::Project,
            label: "Shop".into(),
        }
    }

    #[tokio::test]
    async fn dispatch_applies_attachments_and_prefixes_warnings() {
        let (session, project) = session();
        session
            .dispatch(&Labeler { fail: false }, &created(project))
            .await
            .unwrap();

        let (tree, result) = session.finish().await;
        assert!(tree.find_child_by_label(project, ArtifactKind::Folder, "Models").is_some());
        assert_eq!(result.warnings(), ["labeler: heads up"]);
    }

    #[tokio::test]
    async fn generator_error_is_wrapped_as_fatal() {
        let (session, project) = session();
        let err = session
            .dispatch(&Labeler { fail: true }, &created(project))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("labeler"));
    }

    #[tokio::test]
    async fn subscription_routes_only_accepted_events() {
        let (session, project) = session();
        let bus = MessageBus::new();
        let generator = Arc::new(Labeler { fail: false });
        let tokens = Arc::clone(&generator).subscribe_to_events(&bus, &session);

        let mut other = created(project);
        other.kind = ArtifactKind::Folder;
        bus.publish(other).await.unwrap();
        bus.publish(created(project)).await.unwrap();

        generator.unsubscribe_from_events(&bus, &tokens);
        assert_eq!(bus.total_subscribers(), 0);

        let (tree, _) = session.finish().await;
        assert_eq!(tree.children(project).count(), 1);
    }

    /// Publishes the event it is reacting to back onto the bus.
    struct Echoing {
        bus: MessageBus,
    }

    #[async_trait]
    impl Generator for Echoing {
        fn name(&self) -> &str {
            "echoing"
        }

        fn accepts(&self, event: &ArtifactCreated) -> bool {
            event.kind == ArtifactKind::Project
        }

        async fn react(
            &self,
            event: &ArtifactCreated,
            _tree: &ArtifactTree,
            _ctx: &GeneratorContext,
        ) -> CodeloomResult<Reaction> {
            self.bus.publish(event.clone()).await?;
            Ok(Reaction::none())
        }
    }

    #[tokio::test]
    async fn publishing_from_react_fails_instead_of_hanging() {
        let (session, project) = session();
        let bus = MessageBus::new();
        let generator = Arc::new(Echoing { bus: bus.clone() });
        let tokens = Arc::clone(&generator).subscribe_to_events(&bus, &session);

        let outcome = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            bus.publish(created(project)),
        )
        .await
        .expect("nested dispatch must not deadlock");
        let err = outcome.unwrap_err();
        assert!(err.to_string().contains("re-entered"), "{err}");

        generator.unsubscribe_from_events(&bus, &tokens);
        assert_eq!(bus.total_subscribers(), 0);
    }

    #[test]
    fn absorb_prefixes_template_diagnostics() {
        let parent = ArtifactId::new();
        let mut reaction = Reaction::none();
        reaction.absorb(
            parent,
            TemplateOutput::success(vec![ArtifactDraft::file(
                "a.txt",
                ArtifactContent::Text("a".into()),
            )])
            .with_warning("w"),
            "tpl",
        );
        reaction.absorb(parent, TemplateOutput::failure_message("broken"), "tpl");

        assert_eq!(reaction.attachments.len(), 1);
        assert_eq!(reaction.warnings, ["tpl: w"]);
        assert_eq!(reaction.errors, ["tpl: broken"]);
    }
}
