//! The artifact model: one node type for everything a run can produce.
//!
//! Artifacts live in an [`ArtifactTree`] arena. Each node stores its parent
//! id and an ordered list of child ids; the tree is the only place that can
//! change either, which keeps the parent/child relation consistent.
//!
//! New nodes enter the tree as [`ArtifactDraft`]s: detached descriptions
//! (including nested children and decorators) that the tree turns into
//! identified nodes when they are attached.

mod decorator;
mod state;
mod tree;

pub use decorator::{
    DatasourceBacked, Decorator, DecoratorVariant, EntityTemplate, FileSystemEntry,
};
pub use state::ArtifactState;
pub use tree::{ArtifactSubtree, ArtifactTree, TreeEvent};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use uuid::Uuid;

/// Well-known property names shared by generators, engines and the
/// materializer.
pub mod props {
    /// Full file name of a File or ExistingFile artifact (`Customer.cs`).
    pub const FILE_NAME: &str = "file_name";
    pub const NAMESPACE: &str = "namespace";
    pub const DATA_TYPE: &str = "data_type";
    pub const PRIMARY_KEY: &str = "primary_key";
    pub const NULLABLE: &str = "nullable";
    /// Original column name an entity property was derived from.
    pub const COLUMN: &str = "column";
    /// Template id an entity asks to be rendered with.
    pub const TEMPLATE: &str = "template";
}

// ── Identity ─────────────────────────────────────────────────────────────────

/// Stable artifact identity, assigned at creation and kept across renames,
/// moves and memento restoration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactId(Uuid);

impl ArtifactId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ArtifactId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Kind ─────────────────────────────────────────────────────────────────────

/// Concrete artifact kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactKind {
    Workspace,
    Project,
    Folder,
    File,
    ExistingFile,
    Datasource,
    Table,
    View,
    Column,
    Entity,
    EntityProperty,
}

impl ArtifactKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Workspace => "workspace",
            Self::Project => "project",
            Self::Folder => "folder",
            Self::File => "file",
            Self::ExistingFile => "existing-file",
            Self::Datasource => "datasource",
            Self::Table => "table",
            Self::View => "view",
            Self::Column => "column",
            Self::Entity => "entity",
            Self::EntityProperty => "entity-property",
        }
    }

    /// Whether artifacts of this kind end up as files on disk.
    pub const fn is_file(&self) -> bool {
        matches!(self, Self::File | Self::ExistingFile)
    }

    /// Whether artifacts of this kind become a path segment on disk.
    pub const fn is_path_segment(&self) -> bool {
        matches!(
            self,
            Self::Project | Self::Folder | Self::File | Self::ExistingFile
        )
    }

    /// Icon reference used when a draft does not name one.
    pub const fn default_icon(&self) -> &'static str {
        match self {
            Self::Workspace => "workspace",
            Self::Project => "project",
            Self::Folder => "folder",
            Self::File | Self::ExistingFile => "file",
            Self::Datasource => "database",
            Self::Table | Self::View => "table",
            Self::Column | Self::EntityProperty => "field",
            Self::Entity => "class",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Property values ──────────────────────────────────────────────────────────

/// A typed property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum PropertyValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    List(Vec<String>),
}

impl PropertyValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<Vec<String>> for PropertyValue {
    fn from(value: Vec<String>) -> Self {
        Self::List(value)
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Integer(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{}", x),
            Self::Text(s) => f.write_str(s),
            Self::List(items) => f.write_str(&items.join(", ")),
        }
    }
}

// ── Content ──────────────────────────────────────────────────────────────────

/// Rendered content carried by a File artifact.
///
/// ExistingFile artifacts carry no content; their source path lives on a
/// [`FileSystemEntry`] decorator and the file is copied verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum ArtifactContent {
    Text(String),
    Binary(Vec<u8>),
}

impl ArtifactContent {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(s) => s.as_bytes(),
            Self::Binary(b) => b,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Binary(_) => None,
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ── Artifact node ────────────────────────────────────────────────────────────

/// A node in an [`ArtifactTree`].
///
/// Fields are only mutable through the tree, so parent/child links and
/// decorator ownership cannot drift apart.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub(crate) id: ArtifactId,
    pub(crate) kind: ArtifactKind,
    pub(crate) label: String,
    pub(crate) icon: Option<String>,
    pub(crate) properties: IndexMap<String, PropertyValue>,
    pub(crate) decorators: IndexMap<&'static str, Decorator>,
    pub(crate) content: Option<ArtifactContent>,
    pub(crate) parent: Option<ArtifactId>,
    pub(crate) children: Vec<ArtifactId>,
}

impl Artifact {
    pub fn id(&self) -> ArtifactId {
        self.id
    }

    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Icon reference, falling back to the kind's default.
    pub fn icon(&self) -> &str {
        self.icon
            .as_deref()
            .unwrap_or_else(|| self.kind.default_icon())
    }

    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }

    /// Text property shortcut.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.property(name).and_then(PropertyValue::as_str)
    }

    /// Boolean property shortcut; absent reads as `false`.
    pub fn flag(&self, name: &str) -> bool {
        self.property(name)
            .and_then(PropertyValue::as_bool)
            .unwrap_or(false)
    }

    pub fn properties(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn decorators(&self) -> impl Iterator<Item = &Decorator> {
        self.decorators.values()
    }

    pub fn has_decorator(&self, key: &str) -> bool {
        self.decorators.contains_key(key)
    }

    pub fn content(&self) -> Option<&ArtifactContent> {
        self.content.as_ref()
    }

    pub fn parent(&self) -> Option<ArtifactId> {
        self.parent
    }

    pub fn children(&self) -> &[ArtifactId] {
        &self.children
    }

    /// Name used on disk: the `file_name` property for files, the label
    /// otherwise.
    pub fn file_name(&self) -> &str {
        self.text(props::FILE_NAME).unwrap_or(&self.label)
    }
}

// ── Drafts ───────────────────────────────────────────────────────────────────

/// A detached description of an artifact (and its children) that has not
/// been attached to a tree yet.
///
/// Generators and template engines produce drafts; only
/// [`ArtifactTree::add_child`] turns them into identified nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactDraft {
    pub kind: ArtifactKind,
    pub label: String,
    pub icon: Option<String>,
    pub properties: IndexMap<String, PropertyValue>,
    pub decorators: Vec<Decorator>,
    pub content: Option<ArtifactContent>,
    pub children: Vec<ArtifactDraft>,
}

impl ArtifactDraft {
    pub fn new(kind: ArtifactKind, label: impl Into<String>) -> Self {
        Self {
            kind,
            label: label.into(),
            icon: None,
            properties: IndexMap::new(),
            decorators: Vec::new(),
            content: None,
            children: Vec::new(),
        }
    }

    pub fn folder(name: impl Into<String>) -> Self {
        Self::new(ArtifactKind::Folder, name)
    }

    /// A generated file. The label is the file stem, the full name is kept
    /// in the `file_name` property.
    pub fn file(file_name: impl Into<String>, content: ArtifactContent) -> Self {
        let file_name = file_name.into();
        Self::new(ArtifactKind::File, file_stem(&file_name))
            .with_property(props::FILE_NAME, file_name)
            .with_content(content)
    }

    /// A file copied verbatim from `source`.
    pub fn existing_file(file_name: impl Into<String>, source: impl AsRef<Path>) -> Self {
        let file_name = file_name.into();
        Self::new(ArtifactKind::ExistingFile, file_stem(&file_name))
            .with_property(props::FILE_NAME, file_name)
            .with_decorator(FileSystemEntry::new(source.as_ref()))
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    pub fn with_decorator(mut self, decorator: impl Into<Decorator>) -> Self {
        self.decorators.push(decorator.into());
        self
    }

    pub fn with_content(mut self, content: ArtifactContent) -> Self {
        self.content = Some(content);
        self
    }

    pub fn with_child(mut self, child: ArtifactDraft) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = ArtifactDraft>) -> Self {
        self.children.extend(children);
        self
    }

    /// Name this draft will have on disk.
    pub fn file_name(&self) -> &str {
        self.properties
            .get(props::FILE_NAME)
            .and_then(PropertyValue::as_str)
            .unwrap_or(&self.label)
    }

    /// Number of drafts in this subtree, including `self`.
    pub fn len(&self) -> usize {
        1 + self.children.iter().map(ArtifactDraft::len).sum::<usize>()
    }

    /// Always false; a draft describes at least one artifact.
    pub fn is_empty(&self) -> bool {
        false
    }
}

fn file_stem(file_name: &str) -> String {
    match file_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => file_name.to_string(),
    }
}
