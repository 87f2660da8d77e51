//! In-memory template store with built-in templates.

use std::{
    collections::BTreeMap,
    sync::{Arc, RwLock},
};

use tracing::debug;

use codeloom_core::{
    application::{ApplicationError, ports::TemplateStore},
    domain::{DomainError, Template, TemplateId},
    error::CodeloomResult,
};

use crate::builtin_templates;

/// Thread-safe in-memory template store keyed by plain template id.
///
/// Special-folder ids (`@folder/...`) are resolved through the path resolver
/// and never stored here.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<RwLock<BTreeMap<TemplateId, Template>>>,
}

impl InMemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store with built-in templates loaded.
    pub fn with_builtin() -> CodeloomResult<Self> {
        let store = Self::new();
        store.load_builtin()?;
        Ok(store)
    }

    /// Load built-in templates, replacing any with the same id.
    pub fn load_builtin(&self) -> CodeloomResult<()> {
        for template in builtin_templates::all_templates()? {
            self.insert(template)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clear all templates.
    pub fn clear(&self) -> CodeloomResult<()> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| ApplicationError::StoreLockError)?;
        inner.clear();
        Ok(())
    }
}

impl TemplateStore for InMemoryStore {
    fn get(&self, id: &TemplateId) -> CodeloomResult<Template> {
        let inner = self
            .inner
            .read()
            .map_err(|_| ApplicationError::StoreLockError)?;

        inner.get(id).cloned().ok_or_else(|| {
            ApplicationError::TemplateResolution {
                id: id.to_string(),
                reason: "no template with this id is registered".into(),
            }
            .into()
        })
    }

    fn list(&self) -> CodeloomResult<Vec<Template>> {
        let inner = self
            .inner
            .read()
            .map_err(|_| ApplicationError::StoreLockError)?;

        Ok(inner.values().cloned().collect())
    }

    fn insert(&self, template: Template) -> CodeloomResult<()> {
        if template.id().is_special_folder() {
            return Err(DomainError::InvalidTemplateId {
                id: template.id().to_string(),
                reason: "special-folder templates cannot be stored".into(),
            }
            .into());
        }

        let mut inner = self
            .inner
            .write()
            .map_err(|_| ApplicationError::StoreLockError)?;

        debug!(template = %template.id(), "Storing template");
        inner.insert(template.id().clone(), template);
        Ok(())
    }

    fn remove(&self, id: &TemplateId) -> CodeloomResult<()> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| ApplicationError::StoreLockError)?;

        inner
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| {
                ApplicationError::TemplateResolution {
                    id: id.to_string(),
                    reason: "no template with this id is registered".into(),
                }
                .into()
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> TemplateId {
        TemplateId::parse(s).unwrap()
    }

    #[test]
    fn builtin_templates_are_loaded() {
        let store = InMemoryStore::with_builtin().unwrap();
        assert!(store.get(&id("entity-class")).is_ok());
        assert!(store.get(&id("project-file")).is_ok());
        assert_eq!(store.len(), store.list().unwrap().len());
    }

    #[test]
    fn insert_replaces_and_remove_forgets() {
        let store = InMemoryStore::new();
        store
            .insert(Template::owned(id("readme"), "tera", "v1"))
            .unwrap();
        store
            .insert(Template::owned(id("readme"), "tera", "v2"))
            .unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(
            store.get(&id("readme")).unwrap().source().inline_text(),
            Some("v2")
        );

        store.remove(&id("readme")).unwrap();
        assert!(store.is_empty());
        assert!(store.remove(&id("readme")).is_err());
    }

    #[test]
    fn special_folder_ids_are_rejected() {
        let store = InMemoryStore::new();
        let err = store
            .insert(Template::file(id("@templates/a.cs.tera"), "/t/a.cs.tera"))
            .unwrap_err();
        assert!(err.to_string().contains("cannot be stored"));
    }

    #[test]
    fn unknown_id_is_a_resolution_error() {
        let err = InMemoryStore::new().get(&id("nope")).unwrap_err();
        assert!(matches!(
            err,
            codeloom_core::error::CodeloomError::Application(
                ApplicationError::TemplateResolution { .. }
            )
        ));
    }
}
