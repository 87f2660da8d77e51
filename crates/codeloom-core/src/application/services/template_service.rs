//! Template resolution and rendering.
//!
//! [`TemplateResolver`] turns a [`TemplateId`] into a [`Template`]: plain ids
//! come from the [`TemplateStore`], `@folder/relative` ids from the
//! [`PathResolver`]. [`TemplateRenderer`] is what generators call. It resolves,
//! fills in built-in parameters, checks declared parameters, picks an engine
//! and never returns an `Err`: every problem ends up in the [`TemplateOutput`].

use chrono::{Datelike, Utc};
use indexmap::IndexMap;
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::{
    application::{
        ApplicationError,
        engine::{EngineRegistry, RenderScope},
        ports::{DefinitionSource, PathResolver, ResolvedTemplatePath, TemplateStore},
    },
    domain::{
        Template, TemplateId, TemplateInstance, TemplateOutput, params,
    },
    error::CodeloomResult,
};

/// Maps template ids to templates.
#[derive(Clone)]
pub struct TemplateResolver {
    store: Arc<dyn TemplateStore>,
    paths: Option<Arc<dyn PathResolver>>,
}

impl TemplateResolver {
    pub fn new(store: Arc<dyn TemplateStore>) -> Self {
        Self { store, paths: None }
    }

    /// Enable `@folder/relative` ids.
    pub fn with_paths(mut self, paths: Arc<dyn PathResolver>) -> Self {
        self.paths = Some(paths);
        self
    }

    #[instrument(skip(self), fields(template = %id))]
    pub fn resolve(&self, id: &TemplateId) -> CodeloomResult<Template> {
        let Some((folder, relative)) = id.special_folder() else {
            return self.store.get(id);
        };

        let paths = self
            .paths
            .as_ref()
            .ok_or_else(|| ApplicationError::TemplateResolution {
                id: id.to_string(),
                reason: "special folders are not configured".into(),
            })?;

        let template = match paths.resolve(folder, relative)? {
            ResolvedTemplatePath::File(path) => Template::file(id.clone(), path),
            ResolvedTemplatePath::Folder(path) => Template::folder(id.clone(), path),
        };
        debug!(source = ?template.source(), "Resolved special-folder template");
        Ok(template)
    }

    /// Templates from the store. Special-folder templates are not enumerated.
    pub fn list(&self) -> CodeloomResult<Vec<Template>> {
        self.store.list()
    }

    /// Names of the configured special folders.
    pub fn folders(&self) -> Vec<String> {
        self.paths.as_ref().map(|p| p.folders()).unwrap_or_default()
    }

    pub fn store(&self) -> &Arc<dyn TemplateStore> {
        &self.store
    }
}

/// Renders templates by id for generators.
#[derive(Clone)]
pub struct TemplateRenderer {
    resolver: TemplateResolver,
    engines: EngineRegistry,
    definitions: Option<Arc<dyn DefinitionSource>>,
}

impl TemplateRenderer {
    pub fn new(resolver: TemplateResolver, engines: EngineRegistry) -> Self {
        Self {
            resolver,
            engines,
            definitions: None,
        }
    }

    /// Look up `.params` definitions for file templates that carry none.
    pub fn with_definitions(mut self, definitions: Arc<dyn DefinitionSource>) -> Self {
        self.definitions = Some(definitions);
        self
    }

    pub fn resolver(&self) -> &TemplateResolver {
        &self.resolver
    }

    pub fn engines(&self) -> &EngineRegistry {
        &self.engines
    }

    /// Resolve `id` and render it with `parameters`.
    ///
    /// An id that cannot be resolved yields a `Failure` carrying the reason.
    #[instrument(skip(self, parameters, cancel), fields(template = %id))]
    pub async fn render(
        &self,
        id: &TemplateId,
        parameters: IndexMap<String, Value>,
        cancel: &CancellationToken,
    ) -> TemplateOutput {
        let template = match self.resolver.resolve(id) {
            Ok(template) => template,
            Err(e) => {
                warn!(error = %e, "Template could not be resolved");
                return TemplateOutput::failure_message(format!(
                    "template '{}' could not be resolved: {}",
                    id, e
                ));
            }
        };

        let mut instance = TemplateInstance::new(template);
        instance.extend_parameters(parameters);
        self.render_instance(instance, cancel).await
    }

    /// Render an already resolved instance.
    pub async fn render_instance(
        &self,
        mut instance: TemplateInstance,
        cancel: &CancellationToken,
    ) -> TemplateOutput {
        if cancel.is_cancelled() {
            return TemplateOutput::failure_message("rendering cancelled");
        }

        let now = Utc::now();
        instance.set_default(params::GENERATED_AT, now.to_rfc3339());
        instance.set_default(params::YEAR, now.year());

        let id = instance.template().id().clone();
        let Some(engine) = self.engines.for_template(instance.template()) else {
            let key = instance.template().engine_key().unwrap_or("folder");
            return TemplateOutput::failure_message(format!(
                "no template engine registered for '{}' (template '{}')",
                key, id
            ));
        };

        let scope = RenderScope {
            resolver: &self.resolver,
            engines: &self.engines,
            definitions: self.definitions.as_deref(),
        };
        let warnings = scope.definition_warnings(&instance);

        debug!(engine = engine.name(), "Rendering template");
        let mut output = engine.render(&instance, &scope, cancel).await;

        if output.is_success() && output.artifacts().is_empty() {
            output = output.with_warning(format!("template '{}' produced no output", id));
        }
        for warning in warnings {
            output = output.with_warning(warning);
        }
        output
    }
}
