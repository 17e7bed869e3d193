//! Transactional execution
//!
//! The executor consumes a [`ValidatedRequest`] and dispatches its actions
//! in list order against a [`Repository`] session. It performs zero schema
//! validation; that happened when the request was validated.
//!
//! # Commit discipline
//!
//! CREATE and UPDATE never persist directly. They stage entries into a
//! [`TransactionContext`] that is committed as one unit at the end of a
//! transactional batch, or entry-by-entry right after each action in a
//! non-transactional one. DELETE is the deliberate asymmetry: it executes
//! immediately, since deletes are irreversible and order-sensitive.
//!
//! # Failure semantics
//!
//! In transactional mode the first per-action error aborts the batch:
//! staged entities are discarded, best-effort cleanup deletes anything
//! suspected to be partially persisted, and a [`TransactionAbort`] carrying
//! the 1-based failing index is returned. In non-transactional mode each
//! action fails alone and later actions still run.

use crate::error::{ActionError, CleanupFailure, ResolutionError, TransactionAbort};
use crate::normalize::normalize_entity;
use crate::repository::{
    EntityDraft, EntityView, LineageRef, PendingEntity, RemoteRef, Repository, RepositoryError,
    UpdateTarget,
};
use crate::resolver::resolve_reference;
use crate::result::{ActionOutcome, BatchState, ExecutionReport};
use rda_schema::{Action, ActionType, EntityKind, Identifier, Metadata, ValidatedRequest};

/// Executor configuration
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// Attempt best-effort deletes of staged entities when a transactional
    /// batch aborts
    pub cleanup_on_abort: bool,
}

impl EngineConfig {
    /// Default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With abort cleanup toggled
    #[inline]
    #[must_use]
    pub fn with_cleanup_on_abort(mut self, cleanup: bool) -> Self {
        self.cleanup_on_abort = cleanup;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cleanup_on_abort: true,
        }
    }
}

/// Deferred-commit accumulator threaded through one batch.
///
/// Holds every staged CREATE and UPDATE in action order. Tests can inspect
/// it without triggering a commit.
#[derive(Debug, Default)]
pub struct TransactionContext {
    pending: Vec<PendingEntity>,
}

impl TransactionContext {
    /// Empty context
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Staged entries, in staging order
    #[inline]
    #[must_use]
    pub fn pending(&self) -> &[PendingEntity] {
        &self.pending
    }

    /// Number of staged entries
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether nothing is staged
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Stage a new entity, returning its pending-list index
    pub fn stage_create(&mut self, action_index: usize, draft: EntityDraft) -> usize {
        self.pending.push(PendingEntity::Create {
            action_index,
            draft,
        });
        self.pending.len() - 1
    }

    /// Stage an update, returning its pending-list index
    pub fn stage_update(&mut self, action_index: usize, target: UpdateTarget) -> usize {
        self.pending.push(PendingEntity::Update {
            action_index,
            target,
        });
        self.pending.len() - 1
    }

    /// Drain all staged entries
    pub fn take_all(&mut self) -> Vec<PendingEntity> {
        std::mem::take(&mut self.pending)
    }

    /// Find a staged CREATE matching a lineage reference, by provisional
    /// identifier or bare code
    #[must_use]
    pub fn find_pending(&self, reference: &str) -> Option<usize> {
        self.pending.iter().position(|entry| {
            let PendingEntity::Create { draft, .. } = entry else {
                return false;
            };
            draft.provisional_identifier().as_deref() == Some(reference)
                || draft.code.as_deref() == Some(reference)
        })
    }
}

/// Output of one dispatched action
struct StepOutput {
    outcome: ActionOutcome,
    metadata: Option<Metadata>,
}

impl StepOutput {
    fn new(outcome: ActionOutcome) -> Self {
        Self {
            outcome,
            metadata: None,
        }
    }
}

/// The deterministic action executor
///
/// Stateless between batches; one instance can serve many requests as long
/// as the caller serializes access to the underlying session.
#[derive(Debug, Clone, Default)]
pub struct Executor {
    config: EngineConfig,
}

impl Executor {
    /// New executor
    #[inline]
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Configuration in use
    #[inline]
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Execute a validated batch against a live session.
    ///
    /// Actions run strictly in list order; the request is consumed and its
    /// per-action `result`/`error`/`metadata` fields are populated in place.
    ///
    /// # Errors
    /// Returns [`TransactionAbort`] when a transactional batch fails, either
    /// at an action or at commit time. Non-transactional batches never
    /// return an error; per-action failures are recorded in the report.
    pub async fn execute(
        &self,
        request: ValidatedRequest,
        repo: &dyn Repository,
    ) -> Result<ExecutionReport, TransactionAbort> {
        let mut request = request.into_inner();
        let mut state = BatchState::Validated;

        if request.dry_run {
            tracing::info!("dry run: {} actions validated, nothing executed", request.len());
            let outcomes: Vec<ActionOutcome> = request
                .actions
                .iter()
                .map(|a| {
                    ActionOutcome::success(a.action, a.entity)
                        .with_message("validated only, not executed")
                })
                .collect();
            let succeeded = outcomes.len();
            return Ok(ExecutionReport {
                state,
                outcomes,
                succeeded,
                request,
            });
        }

        let transactional = request.transaction && request.has_destructive_actions();
        let total = request.len();
        if transactional {
            tracing::info!("starting transactional batch of {total} actions");
        }
        transition(&mut state, BatchState::Executing);

        let mut ctx = TransactionContext::new();
        let mut outcomes: Vec<ActionOutcome> = Vec::with_capacity(total);

        for index in 0..total {
            let action = request.actions[index].clone();
            tracing::info!(
                "executing action {}/{total}: {} {}",
                index + 1,
                action.action,
                action.entity
            );

            let step = match self.dispatch(&action, index, &mut ctx, repo).await {
                Ok(step) => {
                    if transactional {
                        Ok(step)
                    } else {
                        self.commit_staged_now(step, &mut ctx, repo).await
                    }
                }
                Err(err) => Err(err),
            };

            match step {
                Ok(step) => {
                    let slot = &mut request.actions[index];
                    slot.metadata = step.metadata;
                    slot.result = Some(step.outcome.to_value());
                    outcomes.push(step.outcome);
                }
                Err(err) => {
                    let message = err.to_string();
                    let outcome =
                        ActionOutcome::failure(action.action, action.entity, message.clone());
                    let slot = &mut request.actions[index];
                    slot.error = Some(message.clone());
                    slot.result = Some(outcome.to_value());
                    outcomes.push(outcome);

                    if transactional {
                        tracing::error!("batch failed at action {}: {message}", index + 1);
                        let cleanup = self.cleanup(&ctx, repo).await;
                        transition(&mut state, BatchState::Aborted);
                        return Err(TransactionAbort {
                            action_index: index + 1,
                            source: err,
                            cleanup,
                            outcomes,
                        });
                    }
                    tracing::warn!("action {} failed, continuing: {message}", index + 1);
                }
            }
        }

        if transactional && !ctx.is_empty() {
            tracing::info!("committing {} pending entities", ctx.len());
            match repo.commit(ctx.pending()).await {
                Ok(committed) => {
                    for (entry, identity) in ctx.pending().iter().zip(committed) {
                        let action_index = entry.action_index();
                        let updated = outcomes[action_index]
                            .clone()
                            .with_committed(identity.perm_id, identity.identifier);
                        request.actions[action_index].result = Some(updated.to_value());
                        outcomes[action_index] = updated;
                    }
                }
                Err(err) => {
                    tracing::error!("commit failed: {err}");
                    let failing = commit_failure_index(&err, &ctx, total);
                    let cleanup = self.cleanup(&ctx, repo).await;
                    transition(&mut state, BatchState::Aborted);
                    return Err(TransactionAbort {
                        action_index: failing,
                        source: ActionError::Remote(err),
                        cleanup,
                        outcomes,
                    });
                }
            }
        }

        transition(&mut state, BatchState::Committed);
        let succeeded = outcomes.iter().filter(|o| o.success).count();
        tracing::info!("executed {total} actions, {succeeded} succeeded");

        Ok(ExecutionReport {
            state,
            outcomes,
            succeeded,
            request,
        })
    }

    async fn dispatch(
        &self,
        action: &Action,
        index: usize,
        ctx: &mut TransactionContext,
        repo: &dyn Repository,
    ) -> Result<StepOutput, ActionError> {
        match action.action {
            ActionType::Create => self.execute_create(action, index, ctx, repo).await,
            ActionType::Get => self.execute_get(action, repo).await,
            ActionType::List => self.execute_list(action, repo).await,
            ActionType::Update => self.execute_update(action, index, ctx, repo).await,
            ActionType::Delete => self.execute_delete(action, repo).await,
        }
    }

    async fn execute_create(
        &self,
        action: &Action,
        index: usize,
        ctx: &mut TransactionContext,
        repo: &dyn Repository,
    ) -> Result<StepOutput, ActionError> {
        let payload = action.payload.clone().unwrap_or_default();
        let location = action.location.clone().unwrap_or_default();

        let mut draft = EntityDraft::of_kind(action.entity);
        draft.code = payload.code;
        draft.type_code = payload.type_code;
        draft.properties = payload.properties;
        draft.description = payload.description;
        draft.tags = payload.tags;
        draft.dataset_kind = payload.kind;
        draft.space = location.space;
        draft.project = location.project;
        draft.experiment = location.experiment;
        draft.object = location.object;

        // Local attachments only apply to datasets.
        if action.entity == EntityKind::Dataset {
            draft.files = payload.files;
            draft.folder = payload.folder;
        }

        for reference in &payload.parents {
            let edge = self.resolve_lineage(reference, ctx, repo).await?;
            draft.parents.push(edge);
        }
        for reference in &payload.children {
            let edge = self.resolve_lineage(reference, ctx, repo).await?;
            draft.children.push(edge);
        }

        let code = draft.code.clone();
        ctx.stage_create(index, draft);

        let outcome = ActionOutcome::success(action.action, action.entity)
            .with_message(format!("created {}, queued for commit", action.entity))
            .with_code(code);
        Ok(StepOutput::new(outcome))
    }

    async fn execute_get(
        &self,
        action: &Action,
        repo: &dyn Repository,
    ) -> Result<StepOutput, ActionError> {
        let reference = lookup_reference(action)?;
        let view = fetch_target(repo, action.entity, reference).await?;
        let normalized = normalize_entity(&view)?;

        let outcome = ActionOutcome::success(action.action, action.entity)
            .with_data(normalized.to_value());
        Ok(StepOutput {
            metadata: Some(normalized.metadata),
            outcome,
        })
    }

    async fn execute_list(
        &self,
        action: &Action,
        repo: &dyn Repository,
    ) -> Result<StepOutput, ActionError> {
        let views = repo.list(action.entity).await?;
        let mut data = Vec::with_capacity(views.len());
        for view in &views {
            data.push(normalize_entity(view)?.to_value());
        }

        let outcome = ActionOutcome::success(action.action, action.entity)
            .with_count(data.len())
            .with_data(serde_json::Value::Array(data));
        Ok(StepOutput::new(outcome))
    }

    async fn execute_update(
        &self,
        action: &Action,
        index: usize,
        ctx: &mut TransactionContext,
        repo: &dyn Repository,
    ) -> Result<StepOutput, ActionError> {
        let reference = lookup_reference(action)?;
        let view = fetch_target(repo, action.entity, reference).await?;
        let payload = action.payload.clone().unwrap_or_default();

        let target = UpdateTarget {
            kind: action.entity,
            perm_id: view.perm_id,
            identifier: view.identifier,
            properties: payload.properties,
            description: payload.description,
        };
        ctx.stage_update(index, target);

        let outcome = ActionOutcome::success(action.action, action.entity)
            .with_message(format!("updated {}, queued for commit", action.entity));
        Ok(StepOutput::new(outcome))
    }

    async fn execute_delete(
        &self,
        action: &Action,
        repo: &dyn Repository,
    ) -> Result<StepOutput, ActionError> {
        let reference = lookup_reference(action)?;
        let view = fetch_target(repo, action.entity, reference).await?;

        // Deletes run immediately; they are not staged for the batch commit.
        repo.delete(action.entity, reference).await?;

        let mut outcome = ActionOutcome::success(action.action, action.entity)
            .with_message(format!("deleted {}", action.entity));
        if let Some(identifier) = view.identifier {
            outcome = outcome.with_identifier(identifier);
        }
        Ok(StepOutput::new(outcome))
    }

    /// Resolve a lineage reference, checking entities staged earlier in the
    /// same batch before asking the repository.
    async fn resolve_lineage(
        &self,
        reference: &str,
        ctx: &TransactionContext,
        repo: &dyn Repository,
    ) -> Result<LineageRef, ActionError> {
        if let Some(pending_index) = ctx.find_pending(reference) {
            tracing::debug!("lineage reference {reference} wired to pending entity");
            return Ok(LineageRef::Pending(pending_index));
        }
        let view = resolve_reference(repo, reference).await?;
        Ok(LineageRef::Remote(RemoteRef::from_view(&view)))
    }

    /// Commit everything the current action staged, immediately.
    ///
    /// Non-transactional path: a staged CREATE/UPDATE becomes durable right
    /// after its action, and a commit failure is that action's own failure.
    async fn commit_staged_now(
        &self,
        step: StepOutput,
        ctx: &mut TransactionContext,
        repo: &dyn Repository,
    ) -> Result<StepOutput, ActionError> {
        if ctx.is_empty() {
            return Ok(step);
        }
        let staged = ctx.take_all();
        let committed = repo.commit(&staged).await?;

        let mut outcome = step.outcome;
        if let Some(identity) = committed.into_iter().next() {
            outcome = outcome.with_committed(identity.perm_id, identity.identifier);
        }
        Ok(StepOutput {
            outcome,
            metadata: step.metadata,
        })
    }

    /// Best-effort deletes of staged creates that may have been partially
    /// persisted. Failures are advisory and never replace the abort cause.
    async fn cleanup(
        &self,
        ctx: &TransactionContext,
        repo: &dyn Repository,
    ) -> Vec<CleanupFailure> {
        let mut failures = Vec::new();
        if !self.config.cleanup_on_abort {
            return failures;
        }

        for entry in ctx.pending() {
            let PendingEntity::Create { draft, .. } = entry else {
                continue;
            };
            let (Some(kind), Some(reference)) = (draft.kind, draft.provisional_identifier())
            else {
                continue;
            };
            tracing::debug!("cleanup: deleting {reference}");
            if let Err(err) = repo.delete(kind, &reference).await {
                tracing::warn!("cleanup of {reference} failed: {err}");
                failures.push(CleanupFailure {
                    reference,
                    error: err.to_string(),
                });
            }
        }
        failures
    }
}

fn lookup_reference(action: &Action) -> Result<&str, ActionError> {
    action
        .identifier
        .as_ref()
        .and_then(Identifier::reference)
        .ok_or_else(|| {
            ActionError::Resolution(ResolutionError::UnresolvedReference {
                reference: String::new(),
            })
        })
}

async fn fetch_target(
    repo: &dyn Repository,
    kind: EntityKind,
    reference: &str,
) -> Result<EntityView, ActionError> {
    repo.get(kind, reference)
        .await?
        .ok_or_else(|| ActionError::NotFound {
            kind,
            reference: reference.to_string(),
        })
}

/// Which action to blame when the batch commit itself fails
fn commit_failure_index(
    err: &RepositoryError,
    ctx: &TransactionContext,
    total: usize,
) -> usize {
    match err {
        RepositoryError::CommitRejected { pending_index, .. } => ctx
            .pending()
            .get(*pending_index)
            .map_or(total, |entry| entry.action_index() + 1),
        _ => total,
    }
}

fn transition(state: &mut BatchState, to: BatchState) {
    tracing::debug!("batch state {state:?} -> {to:?}");
    *state = to;
}
