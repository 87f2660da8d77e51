//! Arena-backed artifact tree.

use indexmap::IndexMap;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::PathBuf;

use super::decorator::{DatasourceBacked, Decorator, DecoratorVariant};
use super::{Artifact, ArtifactDraft, ArtifactId, ArtifactKind, PropertyValue};
use crate::domain::error::DomainError;

/// Structural notifications raised by tree mutations, queued in emission
/// order until the owner drains them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeEvent {
    RootCreated {
        root: ArtifactId,
        kind: ArtifactKind,
    },
    ChildAdded {
        parent: ArtifactId,
        child: ArtifactId,
        kind: ArtifactKind,
    },
    ChildRemoved {
        parent: ArtifactId,
        child: ArtifactId,
    },
    PropertyChanged {
        artifact: ArtifactId,
        name: String,
    },
    LabelChanged {
        artifact: ArtifactId,
    },
    DecoratorAdded {
        artifact: ArtifactId,
        key: &'static str,
    },
    DecoratorRemoved {
        artifact: ArtifactId,
        key: &'static str,
    },
}

/// An artifact subtree taken out of a tree by [`ArtifactTree::remove_child`].
///
/// Owns its nodes, keeps their ids, and holds every decorator detached.
/// Hand it back with [`ArtifactTree::adopt`].
#[derive(Debug, Clone)]
pub struct ArtifactSubtree {
    root: ArtifactId,
    nodes: HashMap<ArtifactId, Artifact>,
}

impl ArtifactSubtree {
    pub fn root_id(&self) -> ArtifactId {
        self.root
    }

    pub fn root(&self) -> Option<&Artifact> {
        self.nodes.get(&self.root)
    }

    pub fn get(&self, id: ArtifactId) -> Option<&Artifact> {
        self.nodes.get(&id)
    }

    pub fn contains(&self, id: ArtifactId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// The mutable intermediate representation of a generation run.
///
/// Nodes are keyed by [`ArtifactId`]; each stores its parent id and its
/// ordered child ids. Every mutation goes through this type and either
/// succeeds completely or leaves the tree untouched.
#[derive(Debug, Clone)]
pub struct ArtifactTree {
    root: ArtifactId,
    nodes: HashMap<ArtifactId, Artifact>,
    events: VecDeque<TreeEvent>,
}

impl ArtifactTree {
    /// Create a tree whose root (and its nested children) come from `root`.
    pub fn new(root: ArtifactDraft) -> Result<Self, DomainError> {
        validate_draft(&root)?;

        let ArtifactDraft {
            kind,
            label,
            icon,
            properties,
            decorators,
            content,
            children,
        } = root;

        let id = ArtifactId::new();
        let node = Artifact {
            id,
            kind,
            label,
            icon,
            properties,
            decorators: bind_all(id, decorators),
            content,
            parent: None,
            children: Vec::new(),
        };

        let mut tree = Self {
            root: id,
            nodes: HashMap::from([(id, node)]),
            events: VecDeque::from([TreeEvent::RootCreated { root: id, kind }]),
        };

        for child in children {
            tree.insert_draft(id, child)?;
        }

        Ok(tree)
    }

    /// Tree with a single root node built from a prepared [`Artifact`].
    pub(crate) fn from_root_node(node: Artifact) -> Self {
        let id = node.id;
        Self {
            root: id,
            nodes: HashMap::from([(id, node)]),
            events: VecDeque::new(),
        }
    }

    // -------------------------------------------------------------------------
    // Navigation
    // -------------------------------------------------------------------------

    pub fn root(&self) -> ArtifactId {
        self.root
    }

    pub fn get(&self, id: ArtifactId) -> Option<&Artifact> {
        self.nodes.get(&id)
    }

    pub fn contains(&self, id: ArtifactId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn parent(&self, id: ArtifactId) -> Option<&Artifact> {
        self.get(id)?.parent.and_then(|p| self.get(p))
    }

    /// Children of `id` in insertion order.
    pub fn children(&self, id: ArtifactId) -> impl Iterator<Item = &Artifact> + '_ {
        self.nodes
            .get(&id)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
            .iter()
            .filter_map(|c| self.nodes.get(c))
    }

    /// `id` followed by all of its descendants, pre-order.
    pub fn walk(&self, id: ArtifactId) -> Vec<&Artifact> {
        self.subtree_ids(id)
            .into_iter()
            .filter_map(|i| self.nodes.get(&i))
            .collect()
    }

    /// All descendants of `id`, pre-order, excluding `id` itself.
    pub fn descendants(&self, id: ArtifactId) -> Vec<&Artifact> {
        let mut all = self.walk(id);
        if !all.is_empty() {
            all.remove(0);
        }
        all
    }

    pub fn find_child_by_label(
        &self,
        parent: ArtifactId,
        kind: ArtifactKind,
        label: &str,
    ) -> Option<&Artifact> {
        self.children(parent)
            .find(|c| c.kind == kind && c.label == label)
    }

    /// Nearest strict ancestor matching `predicate`.
    pub fn find_ancestor(
        &self,
        id: ArtifactId,
        predicate: impl Fn(&Artifact) -> bool,
    ) -> Option<&Artifact> {
        let mut current = self.parent(id);
        while let Some(node) = current {
            if predicate(node) {
                return Some(node);
            }
            current = node.parent.and_then(|p| self.get(p));
        }
        None
    }

    pub fn find_ancestor_of_kind(&self, id: ArtifactId, kind: ArtifactKind) -> Option<&Artifact> {
        self.find_ancestor(id, |a| a.kind == kind)
    }

    /// On-disk path of `id` relative to the output root: the owning project
    /// directory, then folder names, then the file name. Artifacts that are
    /// not path segments (entities, tables) are skipped.
    pub fn path_of(&self, id: ArtifactId) -> Option<PathBuf> {
        let mut segments = Vec::new();
        let mut current = self.get(id);
        while let Some(node) = current {
            if node.kind.is_path_segment() {
                segments.push(node.file_name());
            }
            if node.kind == ArtifactKind::Project {
                break;
            }
            current = node.parent.and_then(|p| self.get(p));
        }
        if segments.is_empty() {
            return None;
        }
        Some(segments.into_iter().rev().collect())
    }

    // -------------------------------------------------------------------------
    // Structural mutation
    // -------------------------------------------------------------------------

    /// Attach `draft` (and its nested children) under `parent`.
    ///
    /// Raises `ChildAdded` for the new node and each descendant, pre-order.
    /// A Table or View added under a Datasource gets a [`DatasourceBacked`]
    /// decorator unless it already carries one.
    pub fn add_child(
        &mut self,
        parent: ArtifactId,
        draft: ArtifactDraft,
    ) -> Result<ArtifactId, DomainError> {
        self.node(parent)?;
        validate_draft(&draft)?;
        self.insert_draft(parent, draft)
    }

    /// Re-attach a subtree previously taken out with [`Self::remove_child`],
    /// keeping its ids.
    pub fn adopt(
        &mut self,
        parent: ArtifactId,
        subtree: ArtifactSubtree,
    ) -> Result<ArtifactId, DomainError> {
        self.node(parent)?;
        if let Some(id) = subtree.nodes.keys().find(|id| self.nodes.contains_key(id)) {
            return Err(DomainError::DuplicateArtifactId { id: *id });
        }

        let ArtifactSubtree { root, mut nodes } = subtree;
        self.graft(parent, root, &mut nodes)?;
        Ok(root)
    }

    /// Detach `child` and its subtree from `parent`.
    ///
    /// Removes the datasource decorator the parent attached on insertion and
    /// clears every decorator back-reference in the removed subtree.
    pub fn remove_child(
        &mut self,
        parent: ArtifactId,
        child: ArtifactId,
    ) -> Result<ArtifactSubtree, DomainError> {
        if child == self.root {
            return Err(DomainError::CannotRemoveRoot);
        }
        let parent_node = self.node(parent)?;
        if !parent_node.children.contains(&child) {
            return Err(DomainError::NotAChild { parent, child });
        }
        let parent_kind = parent_node.kind;

        if parent_kind == ArtifactKind::Datasource {
            let node = self.node_mut(child)?;
            let attached_by_parent = node
                .decorators
                .get(DatasourceBacked::KEY)
                .and_then(DatasourceBacked::from_decorator)
                .is_some_and(|d| d.datasource_id() == parent);
            if attached_by_parent {
                node.decorators.shift_remove(DatasourceBacked::KEY);
                self.events.push_back(TreeEvent::DecoratorRemoved {
                    artifact: child,
                    key: DatasourceBacked::KEY,
                });
            }
        }

        self.node_mut(parent)?.children.retain(|c| *c != child);

        let mut nodes = HashMap::new();
        for id in self.subtree_ids(child) {
            if let Some(mut node) = self.nodes.remove(&id) {
                for decorator in node.decorators.values_mut() {
                    decorator.unbind();
                }
                nodes.insert(id, node);
            }
        }
        if let Some(root) = nodes.get_mut(&child) {
            root.parent = None;
        }

        self.events
            .push_back(TreeEvent::ChildRemoved { parent, child });
        Ok(ArtifactSubtree { root: child, nodes })
    }

    // -------------------------------------------------------------------------
    // Decorators
    // -------------------------------------------------------------------------

    pub fn add_decorator(
        &mut self,
        id: ArtifactId,
        decorator: impl Into<Decorator>,
    ) -> Result<(), DomainError> {
        let mut decorator = decorator.into();
        let key = decorator.key();
        let node = self.node_mut(id)?;

        if !decorator.accepts(node.kind) {
            return Err(DomainError::DecoratorKindMismatch {
                key,
                kind: node.kind,
            });
        }
        if node.decorators.contains_key(key) {
            return Err(DomainError::DuplicateDecorator { key, artifact: id });
        }

        decorator.bind(id);
        node.decorators.insert(key, decorator);
        self.events
            .push_back(TreeEvent::DecoratorAdded { artifact: id, key });
        Ok(())
    }

    /// Remove the decorator stored under `key`, returning it detached.
    pub fn remove_decorator(
        &mut self,
        id: ArtifactId,
        key: &str,
    ) -> Result<Option<Decorator>, DomainError> {
        let node = self.node_mut(id)?;
        let Some(mut decorator) = node.decorators.shift_remove(key) else {
            return Ok(None);
        };
        decorator.unbind();
        self.events.push_back(TreeEvent::DecoratorRemoved {
            artifact: id,
            key: decorator.key(),
        });
        Ok(Some(decorator))
    }

    /// Typed decorator lookup.
    pub fn decorator<T: DecoratorVariant>(&self, id: ArtifactId) -> Option<&T> {
        self.get(id)?
            .decorators
            .get(T::KEY)
            .and_then(T::from_decorator)
    }

    /// Typed decorator lookup that fails when the decorator is absent.
    pub fn require_decorator<T: DecoratorVariant>(&self, id: ArtifactId) -> Result<&T, DomainError> {
        self.node(id)?;
        self.decorator::<T>(id).ok_or(DomainError::DecoratorMissing {
            key: T::KEY,
            artifact: id,
        })
    }

    // -------------------------------------------------------------------------
    // Attribute setters
    // -------------------------------------------------------------------------

    /// Set a property. Returns whether the value changed; a change notification
    /// is only raised when it did.
    pub fn set_property(
        &mut self,
        id: ArtifactId,
        name: impl Into<String>,
        value: impl Into<PropertyValue>,
    ) -> Result<bool, DomainError> {
        let name = name.into();
        let value = value.into();
        let node = self.node_mut(id)?;
        if node.properties.get(&name) == Some(&value) {
            return Ok(false);
        }
        node.properties.insert(name.clone(), value);
        self.events
            .push_back(TreeEvent::PropertyChanged { artifact: id, name });
        Ok(true)
    }

    pub fn set_label(&mut self, id: ArtifactId, label: impl Into<String>) -> Result<bool, DomainError> {
        let label = label.into();
        let node = self.node_mut(id)?;
        if node.label == label {
            return Ok(false);
        }
        node.label = label;
        self.events.push_back(TreeEvent::LabelChanged { artifact: id });
        Ok(true)
    }

    // -------------------------------------------------------------------------
    // Events
    // -------------------------------------------------------------------------

    /// Take all pending events in emission order.
    pub fn drain_events(&mut self) -> Vec<TreeEvent> {
        self.events.drain(..).collect()
    }

    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    pub(crate) fn clear_events(&mut self) {
        self.events.clear();
    }

    // -------------------------------------------------------------------------
    // Internal helpers
    // -------------------------------------------------------------------------

    fn node(&self, id: ArtifactId) -> Result<&Artifact, DomainError> {
        self.nodes
            .get(&id)
            .ok_or(DomainError::ArtifactNotFound { id })
    }

    fn node_mut(&mut self, id: ArtifactId) -> Result<&mut Artifact, DomainError> {
        self.nodes
            .get_mut(&id)
            .ok_or(DomainError::ArtifactNotFound { id })
    }

    /// `id` and its descendants, pre-order.
    fn subtree_ids(&self, id: ArtifactId) -> Vec<ArtifactId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(node) = self.nodes.get(&current) else {
                continue;
            };
            out.push(current);
            stack.extend(node.children.iter().rev().copied());
        }
        out
    }

    fn insert_draft(
        &mut self,
        parent: ArtifactId,
        draft: ArtifactDraft,
    ) -> Result<ArtifactId, DomainError> {
        let ArtifactDraft {
            kind,
            label,
            icon,
            properties,
            decorators,
            content,
            children,
        } = draft;

        let id = ArtifactId::new();
        let node = Artifact {
            id,
            kind,
            label,
            icon,
            properties,
            decorators: bind_all(id, decorators),
            content,
            parent: None,
            children: Vec::new(),
        };
        self.link(parent, node)?;

        for child in children {
            self.insert_draft(id, child)?;
        }
        Ok(id)
    }

    /// Insert `node` as the last child of `parent` and run the container hook.
    /// Children listed on `node` are not linked here.
    pub(crate) fn link(&mut self, parent: ArtifactId, mut node: Artifact) -> Result<ArtifactId, DomainError> {
        let id = node.id;
        if self.nodes.contains_key(&id) {
            return Err(DomainError::DuplicateArtifactId { id });
        }

        let parent_node = self.node_mut(parent)?;
        parent_node.children.push(id);
        let parent_kind = parent_node.kind;

        node.parent = Some(parent);
        node.children.clear();
        let kind = node.kind;
        self.nodes.insert(id, node);
        self.events.push_back(TreeEvent::ChildAdded {
            parent,
            child: id,
            kind,
        });

        self.on_child_added(parent, parent_kind, id, kind);
        Ok(id)
    }

    fn on_child_added(
        &mut self,
        parent: ArtifactId,
        parent_kind: ArtifactKind,
        child: ArtifactId,
        child_kind: ArtifactKind,
    ) {
        if parent_kind != ArtifactKind::Datasource || !DatasourceBacked::accepts(child_kind) {
            return;
        }
        let Some(node) = self.nodes.get_mut(&child) else {
            return;
        };
        if node.decorators.contains_key(DatasourceBacked::KEY) {
            return;
        }
        let mut decorator = DatasourceBacked::new(parent).into_decorator();
        decorator.bind(child);
        node.decorators.insert(DatasourceBacked::KEY, decorator);
        self.events.push_back(TreeEvent::DecoratorAdded {
            artifact: child,
            key: DatasourceBacked::KEY,
        });
    }

    fn graft(
        &mut self,
        parent: ArtifactId,
        id: ArtifactId,
        pool: &mut HashMap<ArtifactId, Artifact>,
    ) -> Result<(), DomainError> {
        let mut node = pool
            .remove(&id)
            .ok_or(DomainError::ArtifactNotFound { id })?;
        let children = std::mem::take(&mut node.children);
        for decorator in node.decorators.values_mut() {
            decorator.bind(id);
        }
        self.link(parent, node)?;
        for child in children {
            self.graft(id, child, pool)?;
        }
        Ok(())
    }
}

pub(crate) fn bind_all(id: ArtifactId, decorators: Vec<Decorator>) -> IndexMap<&'static str, Decorator> {
    decorators
        .into_iter()
        .map(|mut d| {
            d.bind(id);
            (d.key(), d)
        })
        .collect()
}

/// Check decorator kinds and key uniqueness for a whole draft subtree before
/// anything is inserted.
fn validate_draft(draft: &ArtifactDraft) -> Result<(), DomainError> {
    validate_decorators(draft.kind, &draft.label, &draft.decorators)?;
    draft.children.iter().try_for_each(validate_draft)
}

pub(crate) fn validate_decorators(
    kind: ArtifactKind,
    label: &str,
    decorators: &[Decorator],
) -> Result<(), DomainError> {
    let mut seen = HashSet::new();
    for decorator in decorators {
        let key = decorator.key();
        if !decorator.accepts(kind) {
            return Err(DomainError::DecoratorKindMismatch { key, kind });
        }
        if !seen.insert(key) {
            return Err(DomainError::ConflictingDecorators {
                key,
                label: label.to_string(),
            });
        }
    }
    Ok(())
}
