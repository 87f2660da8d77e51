//! Decorators: keyed capability bundles attached to artifacts.
//!
//! A decorator holds a non-owning back-reference to the artifact it is
//! attached to. The tree sets it on attach and clears it on removal, so a
//! decorator that was taken off its artifact reports
//! [`DomainError::DecoratorDetached`] instead of acting on stale data.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::{ArtifactId, ArtifactKind};
use crate::domain::error::DomainError;
use crate::domain::template::TemplateId;

/// Typed access to one decorator variant.
pub trait DecoratorVariant: Sized {
    /// Collection key; at most one decorator per key per artifact.
    const KEY: &'static str;

    /// Whether the variant may attach to artifacts of `kind`.
    fn accepts(kind: ArtifactKind) -> bool;

    fn from_decorator(decorator: &Decorator) -> Option<&Self>;

    fn into_decorator(self) -> Decorator;
}

/// The closed set of decorators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "key")]
pub enum Decorator {
    #[serde(rename = "datasource-backed")]
    DatasourceBacked(DatasourceBacked),
    #[serde(rename = "fs-entry")]
    FileSystemEntry(FileSystemEntry),
    #[serde(rename = "entity-template")]
    EntityTemplate(EntityTemplate),
}

impl Decorator {
    pub fn key(&self) -> &'static str {
        match self {
            Self::DatasourceBacked(_) => DatasourceBacked::KEY,
            Self::FileSystemEntry(_) => FileSystemEntry::KEY,
            Self::EntityTemplate(_) => EntityTemplate::KEY,
        }
    }

    pub fn accepts(&self, kind: ArtifactKind) -> bool {
        match self {
            Self::DatasourceBacked(_) => DatasourceBacked::accepts(kind),
            Self::FileSystemEntry(_) => FileSystemEntry::accepts(kind),
            Self::EntityTemplate(_) => EntityTemplate::accepts(kind),
        }
    }

    /// The artifact this decorator is attached to, if any.
    pub fn owner(&self) -> Option<ArtifactId> {
        *self.owner_slot()
    }

    pub fn is_attached(&self) -> bool {
        self.owner().is_some()
    }

    pub(crate) fn bind(&mut self, owner: ArtifactId) {
        *self.owner_slot_mut() = Some(owner);
    }

    pub(crate) fn unbind(&mut self) {
        *self.owner_slot_mut() = None;
    }

    /// Copy with the back-reference cleared, as stored in mementos.
    pub(crate) fn detached(&self) -> Self {
        let mut copy = self.clone();
        copy.unbind();
        copy
    }

    fn owner_slot(&self) -> &Option<ArtifactId> {
        match self {
            Self::DatasourceBacked(d) => &d.owner,
            Self::FileSystemEntry(d) => &d.owner,
            Self::EntityTemplate(d) => &d.owner,
        }
    }

    fn owner_slot_mut(&mut self) -> &mut Option<ArtifactId> {
        match self {
            Self::DatasourceBacked(d) => &mut d.owner,
            Self::FileSystemEntry(d) => &mut d.owner,
            Self::EntityTemplate(d) => &mut d.owner,
        }
    }
}

fn require_owner(owner: Option<ArtifactId>, key: &'static str) -> Result<ArtifactId, DomainError> {
    owner.ok_or(DomainError::DecoratorDetached { key })
}

// ── DatasourceBacked ─────────────────────────────────────────────────────────

/// Marks a Table or View as backed by a rectangular datasource that can
/// produce preview rows.
///
/// Attached automatically when a Table or View is added under a Datasource,
/// and removed again when it is taken out of that datasource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasourceBacked {
    #[serde(skip)]
    owner: Option<ArtifactId>,
    datasource: ArtifactId,
}

impl DatasourceBacked {
    pub fn new(datasource: ArtifactId) -> Self {
        Self {
            owner: None,
            datasource,
        }
    }

    /// The table or view this decorator augments.
    pub fn table(&self) -> Result<ArtifactId, DomainError> {
        require_owner(self.owner, Self::KEY)
    }

    /// The datasource artifact the rows come from.
    pub fn datasource(&self) -> Result<ArtifactId, DomainError> {
        require_owner(self.owner, Self::KEY)?;
        Ok(self.datasource)
    }

    pub(crate) fn datasource_id(&self) -> ArtifactId {
        self.datasource
    }
}

impl DecoratorVariant for DatasourceBacked {
    const KEY: &'static str = "datasource-backed";

    fn accepts(kind: ArtifactKind) -> bool {
        matches!(kind, ArtifactKind::Table | ArtifactKind::View)
    }

    fn from_decorator(decorator: &Decorator) -> Option<&Self> {
        match decorator {
            Decorator::DatasourceBacked(d) => Some(d),
            _ => None,
        }
    }

    fn into_decorator(self) -> Decorator {
        Decorator::DatasourceBacked(self)
    }
}

// ── FileSystemEntry ──────────────────────────────────────────────────────────

/// Wraps a file-system entry: the source of a passthrough file, the
/// directory a folder was read from, or a project's output root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSystemEntry {
    #[serde(skip)]
    owner: Option<ArtifactId>,
    path: PathBuf,
}

impl FileSystemEntry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            owner: None,
            path: path.into(),
        }
    }

    pub fn path(&self) -> Result<&Path, DomainError> {
        require_owner(self.owner, Self::KEY)?;
        Ok(&self.path)
    }
}

impl DecoratorVariant for FileSystemEntry {
    const KEY: &'static str = "fs-entry";

    fn accepts(kind: ArtifactKind) -> bool {
        matches!(
            kind,
            ArtifactKind::File
                | ArtifactKind::ExistingFile
                | ArtifactKind::Folder
                | ArtifactKind::Project
        )
    }

    fn from_decorator(decorator: &Decorator) -> Option<&Self> {
        match decorator {
            Decorator::FileSystemEntry(d) => Some(d),
            _ => None,
        }
    }

    fn into_decorator(self) -> Decorator {
        Decorator::FileSystemEntry(self)
    }
}

// ── EntityTemplate ───────────────────────────────────────────────────────────

/// Binds an entity to the template it is rendered with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityTemplate {
    #[serde(skip)]
    owner: Option<ArtifactId>,
    template: String,
}

impl EntityTemplate {
    pub fn new(template: &TemplateId) -> Self {
        Self {
            owner: None,
            template: template.as_str().to_string(),
        }
    }

    pub fn template_id(&self) -> Result<TemplateId, DomainError> {
        require_owner(self.owner, Self::KEY)?;
        TemplateId::parse(&self.template)
    }
}

impl DecoratorVariant for EntityTemplate {
    const KEY: &'static str = "entity-template";

    fn accepts(kind: ArtifactKind) -> bool {
        kind == ArtifactKind::Entity
    }

    fn from_decorator(decorator: &Decorator) -> Option<&Self> {
        match decorator {
            Decorator::EntityTemplate(d) => Some(d),
            _ => None,
        }
    }

    fn into_decorator(self) -> Decorator {
        Decorator::EntityTemplate(self)
    }
}

impl From<DatasourceBacked> for Decorator {
    fn from(value: DatasourceBacked) -> Self {
        value.into_decorator()
    }
}

impl From<FileSystemEntry> for Decorator {
    fn from(value: FileSystemEntry) -> Self {
        value.into_decorator()
    }
}

impl From<EntityTemplate> for Decorator {
    fn from(value: EntityTemplate) -> Self {
        value.into_decorator()
    }
}
