//! In-crate fakes shared by the application tests.

use async_trait::async_trait;
use indexmap::IndexMap;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::application::{
    ApplicationError, EngineRegistry, ProgressEvent, RenderScope, TemplateEngine,
    TemplateRenderer, TemplateResolver,
    ports::{ProgressSink, TemplateStore},
};
use crate::domain::{
    ArtifactContent, ArtifactDraft, Template, TemplateId, TemplateInstance, TemplateOutput,
};
use crate::error::CodeloomResult;

#[derive(Default)]
pub struct FakeStore {
    templates: Mutex<IndexMap<TemplateId, Template>>,
}

impl FakeStore {
    pub fn with(self, template: Template) -> Self {
        self.templates
            .lock()
            .unwrap()
            .insert(template.id().clone(), template);
        self
    }
}

impl TemplateStore for FakeStore {
    fn get(&self, id: &TemplateId) -> CodeloomResult<Template> {
        self.templates
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| {
                ApplicationError::TemplateResolution {
                    id: id.to_string(),
                    reason: "not in store".into(),
                }
                .into()
            })
    }

    fn list(&self) -> CodeloomResult<Vec<Template>> {
        Ok(self.templates.lock().unwrap().values().cloned().collect())
    }

    fn insert(&self, template: Template) -> CodeloomResult<()> {
        self.templates
            .lock()
            .unwrap()
            .insert(template.id().clone(), template);
        Ok(())
    }

    fn remove(&self, id: &TemplateId) -> CodeloomResult<()> {
        self.templates.lock().unwrap().shift_remove(id);
        Ok(())
    }
}

/// Renders a single file whose content is the JSON of the parameters.
pub struct EchoEngine {
    name: &'static str,
    extensions: &'static [&'static str],
}

impl EchoEngine {
    /// Parameter that makes the engine return an empty success.
    pub const EMPTY: &'static str = "echo_empty";
    /// Parameter whose string value is returned as a failure.
    pub const FAIL: &'static str = "echo_fail";

    pub fn new(name: &'static str, extensions: &'static [&'static str]) -> Self {
        Self { name, extensions }
    }
}

#[async_trait]
impl TemplateEngine for EchoEngine {
    fn name(&self) -> &'static str {
        self.name
    }

    fn extensions(&self) -> &[&'static str] {
        self.extensions
    }

    async fn render(
        &self,
        instance: &TemplateInstance,
        _scope: &RenderScope<'_>,
        _cancel: &CancellationToken,
    ) -> TemplateOutput {
        if instance.parameter(Self::EMPTY).is_some() {
            return TemplateOutput::success(Vec::new());
        }
        if let Some(reason) = instance.parameter_str(Self::FAIL) {
            return TemplateOutput::failure_message(reason);
        }
        let text = serde_json::to_string(instance.parameters()).unwrap();
        TemplateOutput::success(vec![ArtifactDraft::file(
            instance.resolved_file_name(),
            ArtifactContent::Text(text),
        )])
    }
}

/// Renderer backed by `store` and an echo engine for the `echo` key.
pub fn echo_renderer(store: FakeStore) -> Arc<TemplateRenderer> {
    let resolver = TemplateResolver::new(Arc::new(store));
    let engines = EngineRegistry::new().with(Arc::new(EchoEngine::new("echo", &["echo"])));
    Arc::new(TemplateRenderer::new(resolver, engines))
}

#[derive(Default)]
pub struct RecordingProgress {
    pub events: Mutex<Vec<ProgressEvent>>,
}

impl ProgressSink for RecordingProgress {
    fn report(&self, event: ProgressEvent) {
        self.events.lock().unwrap().push(event);
    }
}
