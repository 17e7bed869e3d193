//! Canonical types for structured repository operations
//!
//! Defines the intermediate representation that decouples request planning
//! from deterministic execution:
//! - Controlled vocabularies (ActionType, EntityKind, DatasetKind)
//! - Identifier and Location references
//! - Payload and Metadata bodies
//! - Action and ActionRequest containers

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Operation to perform on an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActionType {
    /// Register a new entity
    Create,
    /// Fetch a single existing entity
    Get,
    /// Modify an existing entity
    Update,
    /// Enumerate all entities of a kind
    List,
    /// Remove an existing entity
    Delete,
}

impl ActionType {
    /// Whether this operation mutates the repository
    #[inline]
    #[must_use]
    pub fn is_destructive(&self) -> bool {
        matches!(self, Self::Create | Self::Update | Self::Delete)
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Create => "CREATE",
            Self::Get => "GET",
            Self::Update => "UPDATE",
            Self::List => "LIST",
            Self::Delete => "DELETE",
        };
        write!(f, "{s}")
    }
}

/// Kind of repository entity, ordered root-first along the containment
/// hierarchy: Space -> Project -> Experiment -> Object -> Dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntityKind {
    /// Root container
    Space,
    /// Second level, contained in a space
    Project,
    /// Third level, also called a collection
    Experiment,
    /// Fourth level, also called a sample
    Object,
    /// Leaf data holder
    Dataset,
}

impl EntityKind {
    /// All kinds, hierarchy order
    pub const ALL: [Self; 5] = [
        Self::Space,
        Self::Project,
        Self::Experiment,
        Self::Object,
        Self::Dataset,
    ];

    /// Human-facing label used in operator-visible summaries
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Space => "Space",
            Self::Project => "Project",
            Self::Experiment => "Experiment",
            Self::Object => "Sample/Object",
            Self::Dataset => "Dataset",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Space => "SPACE",
            Self::Project => "PROJECT",
            Self::Experiment => "EXPERIMENT",
            Self::Object => "OBJECT",
            Self::Dataset => "DATASET",
        };
        write!(f, "{s}")
    }
}

/// Kind of dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DatasetKind {
    /// Files stored by the repository itself
    Physical,
    /// Reference to externally stored data
    Link,
    /// Grouping of other datasets
    Container,
}

/// Reference to an existing entity, used by GET, UPDATE, and DELETE
///
/// At least one of the two fields must be present and non-empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identifier {
    /// Server-assigned permanent id
    #[serde(rename = "permId", default, skip_serializing_if = "Option::is_none")]
    pub perm_id: Option<String>,
    /// Full hierarchical identifier string, e.g. `/SPACE/PROJECT`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
}

impl Identifier {
    /// Reference by permanent id
    #[inline]
    #[must_use]
    pub fn perm_id(perm_id: impl Into<String>) -> Self {
        Self {
            perm_id: Some(perm_id.into()),
            identifier: None,
        }
    }

    /// Reference by hierarchical path
    #[inline]
    #[must_use]
    pub fn path(identifier: impl Into<String>) -> Self {
        Self {
            perm_id: None,
            identifier: Some(identifier.into()),
        }
    }

    /// Best available reference string for a remote lookup.
    ///
    /// Permanent ids take precedence over path identifiers.
    #[must_use]
    pub fn reference(&self) -> Option<&str> {
        non_empty(self.perm_id.as_deref()).or_else(|| non_empty(self.identifier.as_deref()))
    }

    /// Path identifier if present, else the permanent id.
    ///
    /// Used where a human-readable form is preferred.
    #[must_use]
    pub fn display_reference(&self) -> Option<&str> {
        non_empty(self.identifier.as_deref()).or_else(|| non_empty(self.perm_id.as_deref()))
    }

    /// Whether at least one field carries a usable value
    #[inline]
    #[must_use]
    pub fn is_usable(&self) -> bool {
        self.reference().is_some()
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.is_empty())
}

/// Containment path for a new entity, used by CREATE
///
/// Fields mirror the hierarchy levels. A child-level reference given without
/// its parent is completed by truncating the child's path; see
/// [`Location::derive_ancestors`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// Parent space identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub space: Option<String>,
    /// Parent project identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    /// Parent experiment/collection identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experiment: Option<String>,
    /// Parent object/sample identifier, for datasets
    #[serde(default, alias = "sample", skip_serializing_if = "Option::is_none")]
    pub object: Option<String>,
}

impl Location {
    /// Location directly inside a space
    #[inline]
    #[must_use]
    pub fn in_space(space: impl Into<String>) -> Self {
        Self {
            space: Some(space.into()),
            ..Self::default()
        }
    }

    /// Location inside a project
    #[inline]
    #[must_use]
    pub fn in_project(project: impl Into<String>) -> Self {
        Self {
            project: Some(project.into()),
            ..Self::default()
        }
    }

    /// Location inside an experiment
    #[inline]
    #[must_use]
    pub fn in_experiment(experiment: impl Into<String>) -> Self {
        Self {
            experiment: Some(experiment.into()),
            ..Self::default()
        }
    }

    /// Location attached to an object/sample
    #[inline]
    #[must_use]
    pub fn on_object(object: impl Into<String>) -> Self {
        Self {
            object: Some(object.into()),
            ..Self::default()
        }
    }

    /// Fill in ancestor fields derivable from child-level paths.
    ///
    /// A project path `/S/P` implies space `/S`; an experiment path `/S/P/E`
    /// implies project `/S/P` and space `/S`. Values that are not absolute
    /// paths are left untouched and absent ancestors that cannot be derived
    /// stay absent. Never fails.
    pub fn derive_ancestors(&mut self) {
        if self.space.is_none() {
            if let Some(project) = &self.project {
                if let Some(parts) = split_path(project, 2) {
                    self.space = Some(format!("/{}", parts[0]));
                }
            }
        }
        if self.project.is_none() {
            if let Some(experiment) = &self.experiment {
                if let Some(parts) = split_path(experiment, 3) {
                    self.project = Some(format!("/{}/{}", parts[0], parts[1]));
                    if self.space.is_none() {
                        self.space = Some(format!("/{}", parts[0]));
                    }
                }
            }
        }
    }

    /// Most specific containment reference, leaf-first
    #[must_use]
    pub fn most_specific(&self) -> Option<&str> {
        non_empty(self.object.as_deref())
            .or_else(|| non_empty(self.experiment.as_deref()))
            .or_else(|| non_empty(self.project.as_deref()))
            .or_else(|| non_empty(self.space.as_deref()))
    }

    /// Whether no containment field is set
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.most_specific().is_none()
    }
}

/// Split an absolute path into its segments if it has at least `min` of them
fn split_path(value: &str, min: usize) -> Option<Vec<&str>> {
    if !value.starts_with('/') {
        return None;
    }
    let parts: Vec<&str> = value
        .split('/')
        .skip(1)
        .filter(|s| !s.is_empty())
        .collect();
    (parts.len() >= min).then_some(parts)
}

/// Data to be written to, or read from, the repository
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    /// Entity code; omitted when server-generated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Repository type of the entity, e.g. `CHEMICAL` or `RAW_IMAGE`
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_code: Option<String>,
    /// Property key-value pairs, insertion-ordered, unique keys
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub properties: IndexMap<String, serde_json::Value>,
    /// Parent identifiers for lineage
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parents: Vec<String>,
    /// Child identifiers for lineage
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<String>,
    /// Dataset kind, datasets only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<DatasetKind>,
    /// Local file paths to attach, datasets only
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,
    /// Local folder path to attach, datasets only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder: Option<String>,
    /// Entity description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Associated tags
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl Payload {
    /// Payload with just a code
    #[inline]
    #[must_use]
    pub fn with_code(code: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            ..Self::default()
        }
    }

    /// Set the entity type
    #[inline]
    #[must_use]
    pub fn typed(mut self, type_code: impl Into<String>) -> Self {
        self.type_code = Some(type_code.into());
        self
    }

    /// Add a property
    #[must_use]
    pub fn property(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Add a parent lineage reference
    #[must_use]
    pub fn parent(mut self, reference: impl Into<String>) -> Self {
        self.parents.push(reference.into());
        self
    }

    /// Add a child lineage reference
    #[must_use]
    pub fn child(mut self, reference: impl Into<String>) -> Self {
        self.children.push(reference.into());
        self
    }

    /// Set the description
    #[inline]
    #[must_use]
    pub fn described(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Read-only metadata populated by the repository
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// Permanent id of the entity
    #[serde(rename = "permId")]
    pub perm_id: String,
    /// Full identifier of the entity
    pub identifier: String,
    /// Username that registered the entity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registrator: Option<String>,
    /// ISO date of registration
    #[serde(
        rename = "registrationDate",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub registration_date: Option<String>,
    /// Username of the last modifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modifier: Option<String>,
    /// ISO date of the last modification
    #[serde(
        rename = "modificationDate",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub modification_date: Option<String>,
    /// Whether the entity itself is frozen
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frozen: Option<bool>,
    /// Whether child assignments are frozen
    #[serde(
        rename = "frozenForChildren",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub frozen_for_children: Option<bool>,
    /// Whether parent assignments are frozen
    #[serde(
        rename = "frozenForParents",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub frozen_for_parents: Option<bool>,
    /// Whether dataset assignments are frozen
    #[serde(
        rename = "frozenForDataSets",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub frozen_for_data_sets: Option<bool>,
}

impl Metadata {
    /// Metadata carrying only the required identity fields
    #[inline]
    #[must_use]
    pub fn identity(perm_id: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self {
            perm_id: perm_id.into(),
            identifier: identifier.into(),
            ..Self::default()
        }
    }
}

/// One atomic operation on one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// The operation
    pub action: ActionType,
    /// The entity kind operated on
    pub entity: EntityKind,
    /// Reference to an existing entity, for GET/UPDATE/DELETE
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<Identifier>,
    /// Containment for a new entity, for CREATE
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    /// Data associated with the operation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Payload>,
    /// Server metadata, populated after execution
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    /// Execution result, populated after execution
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    /// Error message if the operation failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Action {
    /// New action with no reference, containment, or data attached
    #[inline]
    #[must_use]
    pub fn new(action: ActionType, entity: EntityKind) -> Self {
        Self {
            action,
            entity,
            identifier: None,
            location: None,
            payload: None,
            metadata: None,
            result: None,
            error: None,
        }
    }

    /// With an existing-entity reference
    #[inline]
    #[must_use]
    pub fn with_identifier(mut self, identifier: Identifier) -> Self {
        self.identifier = Some(identifier);
        self
    }

    /// With a containment location
    #[inline]
    #[must_use]
    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    /// With a data payload
    #[inline]
    #[must_use]
    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Whether this action mutates the repository
    #[inline]
    #[must_use]
    pub fn is_destructive(&self) -> bool {
        self.action.is_destructive()
    }

    /// Key identifying the entity this action targets, for batch-level
    /// consistency checks. Path identifiers win over permanent ids, and an
    /// identifier wins over a containment location.
    #[must_use]
    pub fn entity_key(&self) -> Option<String> {
        let reference = self
            .identifier
            .as_ref()
            .and_then(Identifier::display_reference)
            .or_else(|| self.location.as_ref().and_then(Location::most_specific))?;
        Some(format!("{}:{}", self.entity, reference))
    }
}

fn default_transaction() -> bool {
    true
}

/// An ordered, non-empty batch of actions forming one unit of work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRequest {
    /// Actions in execution order
    pub actions: Vec<Action>,
    /// Unique id of this request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Human-readable description of the request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Validate only, execute nothing
    #[serde(default)]
    pub dry_run: bool,
    /// Commit all destructive actions as a single unit
    #[serde(default = "default_transaction")]
    pub transaction: bool,
}

impl ActionRequest {
    /// New request with a generated id and default execution options
    #[must_use]
    pub fn new(actions: Vec<Action>) -> Self {
        Self {
            actions,
            request_id: Some(Ulid::new().to_string()),
            description: None,
            dry_run: false,
            transaction: true,
        }
    }

    /// With a description
    #[inline]
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// With the transaction flag
    #[inline]
    #[must_use]
    pub fn with_transaction(mut self, transaction: bool) -> Self {
        self.transaction = transaction;
        self
    }

    /// With the dry-run flag
    #[inline]
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Number of actions in the batch
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether the batch is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// All actions of one operation type
    #[must_use]
    pub fn actions_by_type(&self, action: ActionType) -> Vec<&Action> {
        self.actions.iter().filter(|a| a.action == action).collect()
    }

    /// All actions on one entity kind
    #[must_use]
    pub fn actions_by_entity(&self, entity: EntityKind) -> Vec<&Action> {
        self.actions.iter().filter(|a| a.entity == entity).collect()
    }

    /// Whether any action mutates the repository
    #[must_use]
    pub fn has_destructive_actions(&self) -> bool {
        self.actions.iter().any(Action::is_destructive)
    }

    /// One-line aggregate description of the request.
    ///
    /// Uses the explicit description if present, otherwise counts
    /// action/entity pairs in first-seen order.
    #[must_use]
    pub fn summary(&self) -> String {
        if let Some(description) = &self.description {
            return description.clone();
        }

        let mut counts: IndexMap<String, usize> = IndexMap::new();
        for action in &self.actions {
            *counts
                .entry(format!("{} {}", action.action, action.entity))
                .or_insert(0) += 1;
        }

        let parts: Vec<String> = counts
            .iter()
            .map(|(desc, count)| {
                if *count == 1 {
                    desc.clone()
                } else {
                    format!("{count}x {desc}")
                }
            })
            .collect();

        format!(
            "Request with {} action types: {}",
            parts.len(),
            parts.join(", ")
        )
    }
}
