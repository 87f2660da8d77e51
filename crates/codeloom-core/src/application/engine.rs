//! Template engine contract and the extension -> engine registry.

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use tracing::warn;

use crate::application::ports::DefinitionSource;
use crate::application::services::TemplateResolver;
use crate::domain::{Template, TemplateDefinition, TemplateInstance, TemplateOutput, TemplateSource};

/// What an engine may reach while rendering: the resolver for nested
/// template references, the registry for delegating to other engines and
/// the source of `.params.toml` definitions.
#[derive(Clone, Copy)]
pub struct RenderScope<'a> {
    pub resolver: &'a TemplateResolver,
    pub engines: &'a EngineRegistry,
    pub definitions: Option<&'a dyn DefinitionSource>,
}

impl RenderScope<'_> {
    /// Warnings from checking `instance` against its template's definition.
    /// Templates without one, and unreadable definition files, yield none.
    pub fn definition_warnings(&self, instance: &TemplateInstance) -> Vec<String> {
        match self.definition_for(instance.template()) {
            Some(definition) => definition.validate(instance),
            None => Vec::new(),
        }
    }

    fn definition_for(&self, template: &Template) -> Option<TemplateDefinition> {
        if let Some(definition) = template.definition() {
            return Some(definition.clone());
        }
        let (TemplateSource::File(path), Some(source)) = (template.source(), self.definitions)
        else {
            return None;
        };
        match source.definition_for(path) {
            Ok(definition) => definition,
            Err(e) => {
                warn!(error = %e, path = %path.display(), "Ignoring unreadable template definition");
                None
            }
        }
    }
}

/// Port implemented by every rendering technology.
///
/// Expected failures (syntax errors, missing parameters, an unavailable
/// external tool) are returned as [`TemplateOutput::Failure`], never as a
/// panic.
#[async_trait]
pub trait TemplateEngine: Send + Sync {
    fn name(&self) -> &'static str;

    /// File extensions (without the dot) this engine renders.
    fn extensions(&self) -> &[&'static str];

    async fn render(
        &self,
        instance: &TemplateInstance,
        scope: &RenderScope<'_>,
        cancel: &CancellationToken,
    ) -> TemplateOutput;
}

/// Maps file extensions to engines. Folder templates go to the registered
/// folder engine.
#[derive(Clone, Default)]
pub struct EngineRegistry {
    engines: Vec<Arc<dyn TemplateEngine>>,
    by_extension: HashMap<String, usize>,
    folder: Option<Arc<dyn TemplateEngine>>,
}

impl fmt::Debug for EngineRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineRegistry")
            .field("engines", &self.engines.iter().map(|e| e.name()).collect::<Vec<_>>())
            .field("folder", &self.folder.as_ref().map(|e| e.name()))
            .finish()
    }
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an engine for each of its extensions. A later registration
    /// takes over extensions claimed earlier.
    pub fn register(&mut self, engine: Arc<dyn TemplateEngine>) {
        let index = self.engines.len();
        for ext in engine.extensions() {
            self.by_extension.insert(ext.to_ascii_lowercase(), index);
        }
        self.engines.push(engine);
    }

    pub fn with(mut self, engine: Arc<dyn TemplateEngine>) -> Self {
        self.register(engine);
        self
    }

    pub fn register_folder(&mut self, engine: Arc<dyn TemplateEngine>) {
        self.folder = Some(engine);
    }

    pub fn with_folder(mut self, engine: Arc<dyn TemplateEngine>) -> Self {
        self.register_folder(engine);
        self
    }

    pub fn for_extension(&self, extension: &str) -> Option<Arc<dyn TemplateEngine>> {
        let extension = extension.trim_start_matches('.').to_ascii_lowercase();
        self.by_extension
            .get(&extension)
            .and_then(|i| self.engines.get(*i))
            .cloned()
    }

    pub fn for_template(&self, template: &Template) -> Option<Arc<dyn TemplateEngine>> {
        match template.source() {
            TemplateSource::Folder(_) => self.folder.clone(),
            _ => self.for_extension(template.engine_key()?),
        }
    }

    pub fn handles(&self, extension: &str) -> bool {
        self.for_extension(extension).is_some()
    }

    /// Registered extensions, sorted.
    pub fn extensions(&self) -> Vec<&str> {
        let mut out: Vec<&str> = self.by_extension.keys().map(String::as_str).collect();
        out.sort_unstable();
        out
    }

    pub fn engine_names(&self) -> Vec<&'static str> {
        self.engines
            .iter()
            .chain(self.folder.iter())
            .map(|e| e.name())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_support::EchoEngine;
    use crate::domain::TemplateId;

    #[test]
    fn lookup_is_case_insensitive_and_ignores_dots() {
        let registry = EngineRegistry::new().with(Arc::new(EchoEngine::new("echo", &["tera"])));
        assert!(registry.for_extension("TERA").is_some());
        assert!(registry.for_extension(".tera").is_some());
        assert!(registry.for_extension("tpl").is_none());
        assert_eq!(registry.extensions(), ["tera"]);
    }

    #[test]
    fn later_registration_takes_over_extension() {
        let registry = EngineRegistry::new()
            .with(Arc::new(EchoEngine::new("first", &["txt", "md"])))
            .with(Arc::new(EchoEngine::new("second", &["txt"])));
        assert_eq!(registry.for_extension("txt").unwrap().name(), "second");
        assert_eq!(registry.for_extension("md").unwrap().name(), "first");
    }

    #[test]
    fn folder_templates_route_to_folder_engine() {
        let id = TemplateId::parse("@t/project").unwrap();
        let folder = Template::folder(id.clone(), "/t/project");
        let registry = EngineRegistry::new().with(Arc::new(EchoEngine::new("echo", &["tera"])));
        assert!(registry.for_template(&folder).is_none());

        let registry = registry.with_folder(Arc::new(EchoEngine::new("folder", &[])));
        assert_eq!(registry.for_template(&folder).unwrap().name(), "folder");
        assert_eq!(registry.engine_names(), ["echo", "folder"]);

        let file = Template::file(id, "/t/a.cs.tera");
        assert_eq!(registry.for_template(&file).unwrap().name(), "echo");
    }
}
