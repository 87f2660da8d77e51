//! Artifact mementos: shallow, serializable snapshots of a subtree.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::tree::{bind_all, validate_decorators};
use super::{Artifact, ArtifactContent, ArtifactId, ArtifactKind, ArtifactTree, Decorator, PropertyValue};
use crate::domain::error::DomainError;

/// Immutable snapshot of an artifact and its descendants.
///
/// Ids are preserved. Decorators are stored without their back-reference;
/// restoring binds them again and runs the same container hooks as
/// [`ArtifactTree::add_child`], which skip decorators already present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactState {
    pub id: ArtifactId,
    pub kind: ArtifactKind,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default)]
    pub properties: IndexMap<String, PropertyValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<ArtifactContent>,
    #[serde(default)]
    pub decorators: Vec<Decorator>,
    #[serde(default)]
    pub children: Vec<ArtifactState>,
}

impl ArtifactState {
    /// Number of artifacts in this snapshot.
    pub fn len(&self) -> usize {
        1 + self.children.iter().map(ArtifactState::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    fn collect_ids(&self, seen: &mut HashSet<ArtifactId>) -> Result<(), DomainError> {
        if !seen.insert(self.id) {
            return Err(DomainError::DuplicateArtifactId { id: self.id });
        }
        validate_decorators(self.kind, &self.label, &self.decorators)?;
        self.children.iter().try_for_each(|c| c.collect_ids(seen))
    }

    fn to_node(&self) -> Artifact {
        Artifact {
            id: self.id,
            kind: self.kind,
            label: self.label.clone(),
            icon: self.icon.clone(),
            properties: self.properties.clone(),
            decorators: bind_all(self.id, self.decorators.clone()),
            content: self.content.clone(),
            parent: None,
            children: Vec::new(),
        }
    }
}

impl ArtifactTree {
    /// Snapshot `id` and its subtree.
    pub fn capture(&self, id: ArtifactId) -> Result<ArtifactState, DomainError> {
        let node = self
            .get(id)
            .ok_or(DomainError::ArtifactNotFound { id })?;

        let children = node
            .children()
            .iter()
            .map(|c| self.capture(*c))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ArtifactState {
            id: node.id,
            kind: node.kind,
            label: node.label.clone(),
            icon: node.icon.clone(),
            properties: node.properties.clone(),
            content: node.content.clone(),
            decorators: node.decorators.values().map(Decorator::detached).collect(),
            children,
        })
    }

    /// Rebuild a tree from a snapshot of its root. The restored tree has no
    /// pending events.
    pub fn restore(state: &ArtifactState) -> Result<ArtifactTree, DomainError> {
        state.collect_ids(&mut HashSet::new())?;

        let mut tree = ArtifactTree::from_root_node(state.to_node());
        for child in &state.children {
            tree.restore_node(state.id, child)?;
        }
        tree.clear_events();
        Ok(tree)
    }

    /// Restore a snapshot as a new child of `parent`, raising the usual
    /// `ChildAdded` events.
    pub fn restore_into(
        &mut self,
        parent: ArtifactId,
        state: &ArtifactState,
    ) -> Result<ArtifactId, DomainError> {
        if !self.contains(parent) {
            return Err(DomainError::ArtifactNotFound { id: parent });
        }
        let mut seen = HashSet::new();
        state.collect_ids(&mut seen)?;
        if let Some(id) = seen.iter().find(|id| self.contains(**id)) {
            return Err(DomainError::DuplicateArtifactId { id: *id });
        }

        self.restore_node(parent, state)?;
        Ok(state.id)
    }

    fn restore_node(&mut self, parent: ArtifactId, state: &ArtifactState) -> Result<(), DomainError> {
        self.link(parent, state.to_node())?;
        for child in &state.children {
            self.restore_node(state.id, child)?;
        }
        Ok(())
    }
}
