//! Testing utilities for the RDA workspace
//!
//! Shared fixtures and an in-memory [`Repository`] with programmable
//! failure injection, so executor behavior can be exercised without a
//! remote instance.

#![allow(missing_docs)]

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rda_engine::{
    CommittedEntity, EntityView, LineageRef, PendingEntity, Relations, Repository,
    RepositoryError,
};
use rda_schema::EntityKind;

/// In-memory repository backing executor tests.
///
/// Stores committed entities as [`EntityView`] values, records every call
/// for later assertions, and can be told to fail specific operations.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    state: Mutex<State>,
}

#[derive(Debug, Default)]
struct State {
    entities: Vec<EntityView>,
    perm_counter: u64,
    deletions: Vec<String>,
    last_commit: Vec<PendingEntity>,
    get_calls: usize,
    list_calls: usize,
    commit_calls: usize,
    delete_calls: usize,
    fail_commit_on_code: Option<String>,
    fail_get_on: Vec<String>,
    fail_get_for: Vec<(EntityKind, String)>,
    deny_deletes: bool,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with an already-committed entity
    #[must_use]
    pub fn with_entity(self, view: EntityView) -> Self {
        self.state.lock().entities.push(view);
        self
    }

    pub fn seed(&self, view: EntityView) {
        self.state.lock().entities.push(view);
    }

    /// Make commit fail when it carries a CREATE with this code
    pub fn fail_commit_on_code(&self, code: impl Into<String>) {
        self.state.lock().fail_commit_on_code = Some(code.into());
    }

    /// Make lookups of this reference fail at the transport level
    pub fn fail_get_on(&self, reference: impl Into<String>) {
        self.state.lock().fail_get_on.push(reference.into());
    }

    /// Make lookups of this reference fail for one kind only
    pub fn fail_get_for(&self, kind: EntityKind, reference: impl Into<String>) {
        self.state.lock().fail_get_for.push((kind, reference.into()));
    }

    /// Make every delete fail with a permission error
    pub fn deny_deletes(&self) {
        self.state.lock().deny_deletes = true;
    }

    /// All committed entities, in commit order
    #[must_use]
    pub fn snapshot(&self) -> Vec<EntityView> {
        self.state.lock().entities.clone()
    }

    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.state.lock().entities.len()
    }

    /// References delete was called with, attempts included
    #[must_use]
    pub fn deletions(&self) -> Vec<String> {
        self.state.lock().deletions.clone()
    }

    /// The pending list handed to the most recent commit call
    #[must_use]
    pub fn last_commit(&self) -> Vec<PendingEntity> {
        self.state.lock().last_commit.clone()
    }

    #[must_use]
    pub fn get_calls(&self) -> usize {
        self.state.lock().get_calls
    }

    #[must_use]
    pub fn list_calls(&self) -> usize {
        self.state.lock().list_calls
    }

    #[must_use]
    pub fn commit_calls(&self) -> usize {
        self.state.lock().commit_calls
    }

    #[must_use]
    pub fn delete_calls(&self) -> usize {
        self.state.lock().delete_calls
    }

    #[must_use]
    pub fn total_calls(&self) -> usize {
        let state = self.state.lock();
        state.get_calls + state.list_calls + state.commit_calls + state.delete_calls
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn get(
        &self,
        kind: EntityKind,
        reference: &str,
    ) -> Result<Option<EntityView>, RepositoryError> {
        let mut state = self.state.lock();
        state.get_calls += 1;
        if state.fail_get_on.iter().any(|r| r == reference)
            || state
                .fail_get_for
                .iter()
                .any(|(k, r)| *k == kind && r == reference)
        {
            return Err(RepositoryError::Transport(format!(
                "injected failure for {reference}"
            )));
        }
        Ok(state
            .entities
            .iter()
            .find(|e| e.kind == Some(kind) && e.matches_reference(reference))
            .cloned())
    }

    async fn list(&self, kind: EntityKind) -> Result<Vec<EntityView>, RepositoryError> {
        let mut state = self.state.lock();
        state.list_calls += 1;
        Ok(state
            .entities
            .iter()
            .filter(|e| e.kind == Some(kind))
            .cloned()
            .collect())
    }

    async fn commit(
        &self,
        pending: &[PendingEntity],
    ) -> Result<Vec<CommittedEntity>, RepositoryError> {
        let mut state = self.state.lock();
        state.commit_calls += 1;
        state.last_commit = pending.to_vec();

        for (pending_index, entry) in pending.iter().enumerate() {
            if let PendingEntity::Create { draft, .. } = entry {
                if state.fail_commit_on_code.is_some()
                    && state.fail_commit_on_code == draft.code
                {
                    return Err(RepositoryError::CommitRejected {
                        pending_index,
                        reason: format!(
                            "server-side validation failed for '{}'",
                            draft.code.clone().unwrap_or_default()
                        ),
                    });
                }
            }
        }

        let mut committed = Vec::with_capacity(pending.len());
        for entry in pending {
            match entry {
                PendingEntity::Create { draft, .. } => {
                    state.perm_counter += 1;
                    let perm_id = format!("PERM-{}", state.perm_counter);
                    let identifier = draft
                        .provisional_identifier()
                        .unwrap_or_else(|| format!("/{perm_id}"));

                    let view = EntityView {
                        kind: draft.kind,
                        perm_id: Some(perm_id.clone()),
                        identifier: Some(identifier.clone()),
                        code: draft.code.clone(),
                        type_code: draft.type_code.clone(),
                        properties: draft.properties.clone(),
                        description: draft.description.clone(),
                        registration_date: Some(Utc::now().to_rfc3339()),
                        parents: Relations::Known(lineage_identifiers(&draft.parents, pending)),
                        children: Relations::Known(lineage_identifiers(&draft.children, pending)),
                        ..EntityView::default()
                    };
                    state.entities.push(view);
                    committed.push(CommittedEntity {
                        perm_id,
                        identifier,
                    });
                }
                PendingEntity::Update { target, .. } => {
                    let found = state.entities.iter_mut().find(|e| {
                        e.kind == Some(target.kind)
                            && ((target.perm_id.is_some() && e.perm_id == target.perm_id)
                                || (target.identifier.is_some()
                                    && e.identifier == target.identifier))
                    });
                    let Some(entity) = found else {
                        return Err(RepositoryError::Rejected(format!(
                            "update target not found: {}",
                            target.identifier.clone().unwrap_or_default()
                        )));
                    };
                    for (key, value) in &target.properties {
                        entity.properties.insert(key.clone(), value.clone());
                    }
                    if let Some(description) = &target.description {
                        entity.description = Some(description.clone());
                    }
                    entity.modification_date = Some(Utc::now().to_rfc3339());
                    committed.push(CommittedEntity {
                        perm_id: entity.perm_id.clone().unwrap_or_default(),
                        identifier: entity.identifier.clone().unwrap_or_default(),
                    });
                }
            }
        }
        Ok(committed)
    }

    async fn delete(&self, kind: EntityKind, reference: &str) -> Result<(), RepositoryError> {
        let mut state = self.state.lock();
        state.delete_calls += 1;
        if state.deny_deletes {
            return Err(RepositoryError::PermissionDenied(format!(
                "deletes disabled: {reference}"
            )));
        }
        state.deletions.push(reference.to_string());
        state
            .entities
            .retain(|e| !(e.kind == Some(kind) && e.matches_reference(reference)));
        Ok(())
    }
}

/// Identifiers a draft's lineage edges point at, pending entries resolved
/// through their provisional identifiers
fn lineage_identifiers(edges: &[LineageRef], pending: &[PendingEntity]) -> Vec<String> {
    edges
        .iter()
        .filter_map(|edge| match edge {
            LineageRef::Pending(index) => pending.get(*index).and_then(|entry| match entry {
                PendingEntity::Create { draft, .. } => draft.provisional_identifier(),
                PendingEntity::Update { target, .. } => target.identifier.clone(),
            }),
            LineageRef::Remote(remote) => {
                remote.identifier.clone().or_else(|| remote.perm_id.clone())
            }
        })
        .collect()
}

/// Committed space fixture
#[must_use]
pub fn space_view(code: &str) -> EntityView {
    EntityView::of_kind(EntityKind::Space)
        .with_identity(format!("SPACE-{code}"), format!("/{code}"))
        .with_code(code)
}

/// Committed project fixture, from its full identifier
#[must_use]
pub fn project_view(identifier: &str) -> EntityView {
    let code = last_segment(identifier);
    EntityView::of_kind(EntityKind::Project)
        .with_identity(format!("PROJ-{code}"), identifier)
        .with_code(code)
}

/// Committed experiment fixture, from its full identifier
#[must_use]
pub fn experiment_view(identifier: &str) -> EntityView {
    let code = last_segment(identifier);
    EntityView::of_kind(EntityKind::Experiment)
        .with_identity(format!("EXP-{code}"), identifier)
        .with_code(code)
}

/// Committed object fixture, from its full identifier
#[must_use]
pub fn object_view(identifier: &str) -> EntityView {
    let code = last_segment(identifier);
    EntityView::of_kind(EntityKind::Object)
        .with_identity(format!("OBJ-{code}"), identifier)
        .with_code(code)
}

fn last_segment(identifier: &str) -> String {
    identifier
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string()
}
