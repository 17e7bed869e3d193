//! Repository capability interface
//!
//! The outbound seam between the engine and the remote entity-management
//! API. Entity construction is client-side (the executor builds an
//! [`EntityDraft`] and defers persistence to [`Repository::commit`]), so the
//! remote surface reduces to four calls: lookup, listing, commit, delete.
//!
//! Remote entities are surfaced as [`EntityView`] values with typed optional
//! fields. A field the transport could not fetch is an explicit absence, not
//! a missing attribute.

use async_trait::async_trait;
use indexmap::IndexMap;
use rda_schema::{DatasetKind, EntityKind};

/// Relationship lists fetched from the remote side.
///
/// `Unavailable` records that the retrieval failed; consumers that treat
/// relationships as auxiliary can flatten it to an empty list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Relations {
    /// The relationship list was retrieved
    Known(Vec<String>),
    /// Retrieval failed; contents unknown
    Unavailable,
}

impl Relations {
    /// The identifiers, empty when unavailable
    #[must_use]
    pub fn identifiers(&self) -> &[String] {
        match self {
            Self::Known(list) => list,
            Self::Unavailable => &[],
        }
    }
}

impl Default for Relations {
    fn default() -> Self {
        Self::Known(Vec::new())
    }
}

/// The four independent frozen-state flags of a repository entity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrozenFlags {
    /// The entity itself is frozen
    pub frozen: Option<bool>,
    /// Child assignments are frozen
    pub for_children: Option<bool>,
    /// Parent assignments are frozen
    pub for_parents: Option<bool>,
    /// Dataset assignments are frozen
    pub for_data_sets: Option<bool>,
}

/// A remote entity as seen through the session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityView {
    /// Declared kind, if the remote side reports one
    pub kind: Option<EntityKind>,
    /// Permanent id
    pub perm_id: Option<String>,
    /// Full hierarchical identifier
    pub identifier: Option<String>,
    /// Entity code
    pub code: Option<String>,
    /// Repository type of the entity
    pub type_code: Option<String>,
    /// Property key-value pairs
    pub properties: IndexMap<String, serde_json::Value>,
    /// Entity description
    pub description: Option<String>,
    /// Username that registered the entity
    pub registrator: Option<String>,
    /// ISO date of registration
    pub registration_date: Option<String>,
    /// Username of the last modifier
    pub modifier: Option<String>,
    /// ISO date of the last modification
    pub modification_date: Option<String>,
    /// Frozen-state flags
    pub frozen: FrozenFlags,
    /// Parent entity identifiers
    pub parents: Relations,
    /// Child entity identifiers
    pub children: Relations,
}

impl EntityView {
    /// Empty view of a known kind
    #[inline]
    #[must_use]
    pub fn of_kind(kind: EntityKind) -> Self {
        Self {
            kind: Some(kind),
            ..Self::default()
        }
    }

    /// Set permanent id and identifier
    #[must_use]
    pub fn with_identity(
        mut self,
        perm_id: impl Into<String>,
        identifier: impl Into<String>,
    ) -> Self {
        self.perm_id = Some(perm_id.into());
        self.identifier = Some(identifier.into());
        self
    }

    /// Set the code
    #[inline]
    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Set the type
    #[inline]
    #[must_use]
    pub fn with_type(mut self, type_code: impl Into<String>) -> Self {
        self.type_code = Some(type_code.into());
        self
    }

    /// Add a property
    #[must_use]
    pub fn with_property(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Set the description
    #[inline]
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Best reference for matching this view against a lookup string
    #[must_use]
    pub fn matches_reference(&self, reference: &str) -> bool {
        self.perm_id.as_deref() == Some(reference)
            || self.identifier.as_deref() == Some(reference)
    }
}

/// Slim reference to an already-resolved remote entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRef {
    /// Kind, when known
    pub kind: Option<EntityKind>,
    /// Permanent id
    pub perm_id: Option<String>,
    /// Full identifier
    pub identifier: Option<String>,
}

impl RemoteRef {
    /// Reference the entity behind a view
    #[must_use]
    pub fn from_view(view: &EntityView) -> Self {
        Self {
            kind: view.kind,
            perm_id: view.perm_id.clone(),
            identifier: view.identifier.clone(),
        }
    }
}

/// A lineage edge wired onto a draft before commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineageRef {
    /// Another entity pending in the same batch, by pending-list index
    Pending(usize),
    /// An entity that already exists remotely
    Remote(RemoteRef),
}

/// Client-side construction of a new entity, persisted at commit time
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityDraft {
    /// Kind of the entity being created
    pub kind: Option<EntityKind>,
    /// Entity code; absent when server-generated
    pub code: Option<String>,
    /// Repository type
    pub type_code: Option<String>,
    /// Properties to set
    pub properties: IndexMap<String, serde_json::Value>,
    /// Description to set
    pub description: Option<String>,
    /// Tags to associate
    pub tags: Vec<String>,
    /// Dataset kind, datasets only
    pub dataset_kind: Option<DatasetKind>,
    /// Containing space identifier
    pub space: Option<String>,
    /// Containing project identifier
    pub project: Option<String>,
    /// Containing experiment identifier
    pub experiment: Option<String>,
    /// Containing object identifier, datasets only
    pub object: Option<String>,
    /// Local files to attach, datasets only
    pub files: Vec<String>,
    /// Local folder to attach, datasets only
    pub folder: Option<String>,
    /// Parent lineage edges
    pub parents: Vec<LineageRef>,
    /// Child lineage edges
    pub children: Vec<LineageRef>,
}

impl EntityDraft {
    /// Empty draft of a kind
    #[inline]
    #[must_use]
    pub fn of_kind(kind: EntityKind) -> Self {
        Self {
            kind: Some(kind),
            ..Self::default()
        }
    }

    /// The identifier this draft will have once committed, when derivable
    /// from its containment and code. Datasets have no hierarchical
    /// identifier before the server assigns one, so their code stands in.
    #[must_use]
    pub fn provisional_identifier(&self) -> Option<String> {
        let code = self.code.as_deref()?;
        match self.kind? {
            EntityKind::Space => Some(format!("/{code}")),
            EntityKind::Project => Some(format!("{}/{code}", self.space.as_deref()?)),
            EntityKind::Experiment => Some(format!("{}/{code}", self.project.as_deref()?)),
            EntityKind::Object => {
                let base = self.project.as_deref().or(self.space.as_deref())?;
                Some(format!("{base}/{code}"))
            }
            EntityKind::Dataset => Some(code.to_string()),
        }
    }
}

/// Property and description changes to apply to an existing entity.
///
/// Properties merge into the remote map: listed keys are added or
/// overwritten, unlisted keys stay untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateTarget {
    /// Kind of the entity being updated
    pub kind: EntityKind,
    /// Permanent id of the target
    pub perm_id: Option<String>,
    /// Full identifier of the target
    pub identifier: Option<String>,
    /// Properties to merge in
    pub properties: IndexMap<String, serde_json::Value>,
    /// New description, if any
    pub description: Option<String>,
}

/// One entry of the deferred-commit accumulator
#[derive(Debug, Clone, PartialEq)]
pub enum PendingEntity {
    /// A new entity awaiting first persistence
    Create {
        /// 0-based index of the originating action
        action_index: usize,
        /// The draft to persist
        draft: EntityDraft,
    },
    /// A mutation of an existing entity awaiting persistence
    Update {
        /// 0-based index of the originating action
        action_index: usize,
        /// The changes to persist
        target: UpdateTarget,
    },
}

impl PendingEntity {
    /// Index of the action that staged this entry
    #[must_use]
    pub fn action_index(&self) -> usize {
        match self {
            Self::Create { action_index, .. } | Self::Update { action_index, .. } => *action_index,
        }
    }
}

/// Identity assigned by the repository at commit time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedEntity {
    /// Server-assigned permanent id
    pub perm_id: String,
    /// Full identifier
    pub identifier: String,
}

/// Failure reported by the remote repository
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    /// The session lacks the required rights
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// An entity with the same code already exists
    #[error("duplicate code: {0}")]
    DuplicateCode(String),

    /// The target entity is frozen against this operation
    #[error("entity is frozen: {0}")]
    Frozen(String),

    /// The commit was rejected because of one pending entry
    #[error("commit rejected for pending entry {pending_index}: {reason}")]
    CommitRejected {
        /// Index into the committed pending list
        pending_index: usize,
        /// Server-reported reason
        reason: String,
    },

    /// Any other rejection
    #[error("operation rejected: {0}")]
    Rejected(String),

    /// The transport layer failed
    #[error("transport failure: {0}")]
    Transport(String),
}

/// Capability points the engine needs from the remote repository.
///
/// One implementation per transport; every method takes the entity kind so
/// implementations dispatch over the closed [`EntityKind`] sum and the
/// compiler enforces exhaustiveness.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Look up one entity by permanent id or full identifier.
    ///
    /// # Errors
    /// Returns [`RepositoryError`] when the remote call itself fails; an
    /// absent entity is `Ok(None)`.
    async fn get(
        &self,
        kind: EntityKind,
        reference: &str,
    ) -> Result<Option<EntityView>, RepositoryError>;

    /// List all entities of a kind.
    ///
    /// # Errors
    /// Returns [`RepositoryError`] when the remote call fails.
    async fn list(&self, kind: EntityKind) -> Result<Vec<EntityView>, RepositoryError>;

    /// Persist a set of pending entities as one unit.
    ///
    /// Returns one [`CommittedEntity`] per pending entry, in order.
    ///
    /// # Errors
    /// Returns [`RepositoryError`]; the common failure mode is
    /// [`RepositoryError::CommitRejected`] naming the offending entry.
    async fn commit(
        &self,
        pending: &[PendingEntity],
    ) -> Result<Vec<CommittedEntity>, RepositoryError>;

    /// Delete one entity by permanent id or full identifier.
    ///
    /// # Errors
    /// Returns [`RepositoryError`] when the entity cannot be deleted.
    async fn delete(&self, kind: EntityKind, reference: &str) -> Result<(), RepositoryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relations_flatten_when_unavailable() {
        assert!(Relations::Unavailable.identifiers().is_empty());
        let known = Relations::Known(vec!["/LAB/OBJ1".to_string()]);
        assert_eq!(known.identifiers().len(), 1);
    }

    #[test]
    fn provisional_identifier_follows_containment() {
        let mut draft = EntityDraft::of_kind(EntityKind::Project);
        draft.code = Some("ALPHA".to_string());
        draft.space = Some("/LAB".to_string());
        assert_eq!(draft.provisional_identifier().as_deref(), Some("/LAB/ALPHA"));

        let mut space = EntityDraft::of_kind(EntityKind::Space);
        space.code = Some("LAB".to_string());
        assert_eq!(space.provisional_identifier().as_deref(), Some("/LAB"));
    }

    #[test]
    fn provisional_identifier_needs_a_code() {
        let draft = EntityDraft::of_kind(EntityKind::Space);
        assert_eq!(draft.provisional_identifier(), None);
    }

    #[test]
    fn object_draft_prefers_project_containment() {
        let mut draft = EntityDraft::of_kind(EntityKind::Object);
        draft.code = Some("OBJ1".to_string());
        draft.space = Some("/LAB".to_string());
        draft.project = Some("/LAB/ALPHA".to_string());
        assert_eq!(
            draft.provisional_identifier().as_deref(),
            Some("/LAB/ALPHA/OBJ1")
        );
    }
}
