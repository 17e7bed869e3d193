//! Functional tests for the transactional executor.
//!
//! These tests exercise the deferred-commit discipline end to end:
//! - CREATE/UPDATE stage entities and persist only at commit time, while
//!   DELETE executes immediately.
//! - A transactional batch is all-or-nothing: any failure discards staged
//!   work and triggers best-effort cleanup.
//! - A non-transactional batch isolates failures per action and makes each
//!   destructive action durable on its own.

use rda_engine::{
    ActionError, BatchState, EngineConfig, Executor, LineageRef, PendingEntity, Relations,
    RepositoryError,
};
use rda_schema::{
    Action, ActionRequest, ActionType, EntityKind, Identifier, Location, Payload, ValidatedRequest,
};
use rda_test_utils::{project_view, space_view, InMemoryRepository};

fn executor() -> Executor {
    init_tracing();
    Executor::new(EngineConfig::new())
}

/// Surface executor logs when RUST_LOG is set; repeated calls are no-ops.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn create_space(code: &str) -> Action {
    Action::new(ActionType::Create, EntityKind::Space).with_payload(Payload::with_code(code))
}

fn create_object(code: &str, space: &str) -> Action {
    Action::new(ActionType::Create, EntityKind::Object)
        .with_location(Location::in_space(space))
        .with_payload(Payload::with_code(code))
}

fn validated(actions: Vec<Action>) -> ValidatedRequest {
    ActionRequest::new(actions)
        .validate()
        .expect("request must validate")
}

/// Tenet: a transactional batch of creates persists through exactly one
/// commit call, and committed identity is back-filled into every outcome.
#[tokio::test]
async fn batch_of_creates_commits_as_one_unit() {
    let repo = InMemoryRepository::new();
    let request = validated(vec![
        create_space("LAB"),
        Action::new(ActionType::Create, EntityKind::Project)
            .with_location(Location::in_space("/LAB"))
            .with_payload(Payload::with_code("ALPHA")),
    ]);

    let report = executor()
        .execute(request, &repo)
        .await
        .expect("batch must commit");

    assert_eq!(report.state, BatchState::Committed);
    assert!(report.all_succeeded());
    assert_eq!(repo.commit_calls(), 1);
    assert_eq!(repo.entity_count(), 2);

    for outcome in &report.outcomes {
        assert!(outcome.perm_id.is_some(), "committed identity back-filled");
        assert!(outcome.identifier.is_some());
    }
    assert_eq!(report.outcomes[1].identifier.as_deref(), Some("/LAB/ALPHA"));
}

/// Tenet: atomicity. When the middle action of a transactional batch fails,
/// nothing at all is persisted, including creates that had already staged
/// successfully.
#[tokio::test]
async fn failing_action_leaves_no_entities() {
    let repo = InMemoryRepository::new();
    let request = validated(vec![
        create_object("OBJ1", "/LAB"),
        Action::new(ActionType::Create, EntityKind::Object)
            .with_location(Location::in_space("/LAB"))
            .with_payload(Payload::with_code("OBJ2").parent("MISSING-REF")),
        create_object("OBJ3", "/LAB"),
    ]);

    let abort = executor()
        .execute(request, &repo)
        .await
        .expect_err("unresolvable parent must abort the batch");

    assert_eq!(abort.action_index, 2);
    assert!(matches!(abort.source, ActionError::Resolution(_)));
    assert_eq!(repo.commit_calls(), 0, "commit never reached");
    assert_eq!(repo.entity_count(), 0, "no partial persistence");

    // The third action was never attempted.
    assert_eq!(abort.outcomes.len(), 2);
    assert!(abort.outcomes[0].success);
    assert!(!abort.outcomes[1].success);
}

/// Tenet: a commit-time rejection aborts the batch, blames the action that
/// staged the offending entry, and best-effort deletes everything staged.
#[tokio::test]
async fn commit_failure_cleans_up_staged_creates() {
    let repo = InMemoryRepository::new();
    repo.fail_commit_on_code("BETA");

    let request = validated(vec![create_space("ALPHA"), create_space("BETA")]);

    let abort = executor()
        .execute(request, &repo)
        .await
        .expect_err("rejected commit must abort");

    assert_eq!(abort.action_index, 2);
    assert!(matches!(
        abort.source,
        ActionError::Remote(RepositoryError::CommitRejected { .. })
    ));
    assert_eq!(repo.entity_count(), 0);

    let deletions = repo.deletions();
    assert!(deletions.contains(&"/ALPHA".to_string()));
    assert!(deletions.contains(&"/BETA".to_string()));
    assert!(abort.cleanup.is_empty(), "cleanup itself succeeded");
}

/// Tenet: cleanup failures are diagnostics on the abort, never the reported
/// cause. The original commit rejection stays the source.
#[tokio::test]
async fn cleanup_failures_are_reported_without_masking_the_cause() {
    let repo = InMemoryRepository::new();
    repo.fail_commit_on_code("BETA");
    repo.deny_deletes();

    let request = validated(vec![create_space("ALPHA"), create_space("BETA")]);

    let abort = executor()
        .execute(request, &repo)
        .await
        .expect_err("rejected commit must abort");

    assert!(matches!(
        abort.source,
        ActionError::Remote(RepositoryError::CommitRejected { .. })
    ));
    assert_eq!(abort.cleanup.len(), 2);
    assert!(abort.cleanup[0].error.contains("permission denied"));
}

/// Tenet: with transaction=false each action fails alone; surviving actions
/// are durable and the report carries a per-action breakdown.
#[tokio::test]
async fn non_transactional_failures_are_isolated() {
    let repo = InMemoryRepository::new();
    let request = ActionRequest::new(vec![
        create_space("ALPHA"),
        Action::new(ActionType::Create, EntityKind::Object)
            .with_location(Location::in_space("/ALPHA"))
            .with_payload(Payload::with_code("OBJ1").parent("MISSING-REF")),
        create_space("GAMMA"),
    ])
    .with_transaction(false)
    .validate()
    .expect("request must validate");

    let report = executor()
        .execute(request, &repo)
        .await
        .expect("non-transactional batches never abort");

    assert_eq!(report.succeeded, 2);
    assert!(report.outcomes[0].success);
    assert!(!report.outcomes[1].success);
    assert!(report.outcomes[1].error.is_some());
    assert!(report.outcomes[2].success);

    assert_eq!(repo.entity_count(), 2);
    assert_eq!(repo.commit_calls(), 2, "one commit per surviving create");
}

/// Tenet: in non-transactional mode a CREATE is durable immediately, so a
/// later GET in the same batch can read it back.
#[tokio::test]
async fn non_transactional_create_is_visible_to_later_get() {
    let repo = InMemoryRepository::new();
    let request = ActionRequest::new(vec![
        create_space("LAB"),
        Action::new(ActionType::Get, EntityKind::Space)
            .with_identifier(Identifier::path("/LAB")),
    ])
    .with_transaction(false)
    .validate()
    .expect("request must validate");

    let report = executor()
        .execute(request, &repo)
        .await
        .expect("batch must succeed");

    assert!(report.all_succeeded());
    let data = report.outcomes[1].data.as_ref().expect("GET carries data");
    assert_eq!(data["payload"]["code"], "LAB");
}

/// Tenet: DELETE is not deferred. It runs before the batch commit, the
/// deliberate asymmetry from CREATE/UPDATE.
#[tokio::test]
async fn delete_executes_immediately_not_at_commit() {
    let repo = InMemoryRepository::new()
        .with_entity(space_view("LAB"))
        .with_entity(project_view("/LAB/ALPHA"));

    let request = validated(vec![
        Action::new(ActionType::Delete, EntityKind::Project)
            .with_identifier(Identifier::path("/LAB/ALPHA")),
        create_space("FRESH"),
    ]);

    let report = executor()
        .execute(request, &repo)
        .await
        .expect("batch must commit");

    assert!(report.all_succeeded());
    assert!(repo.deletions().contains(&"/LAB/ALPHA".to_string()));
    assert_eq!(
        report.outcomes[0].identifier.as_deref(),
        Some("/LAB/ALPHA")
    );

    let kinds: Vec<_> = repo.snapshot().iter().filter_map(|e| e.kind).collect();
    assert!(!kinds.contains(&EntityKind::Project));
    assert!(kinds.contains(&EntityKind::Space));
}

/// Tenet: a parent reference naming an entity created earlier in the same
/// batch wires to the pending entry without any remote lookup.
#[tokio::test]
async fn forward_lineage_reference_wires_to_pending_entity() {
    let repo = InMemoryRepository::new();
    let request = validated(vec![
        create_object("OBJ1", "/LAB"),
        Action::new(ActionType::Create, EntityKind::Object)
            .with_location(Location::in_space("/LAB"))
            .with_payload(Payload::with_code("OBJ2").parent("/LAB/OBJ1")),
    ]);

    let report = executor()
        .execute(request, &repo)
        .await
        .expect("batch must commit");

    assert!(report.all_succeeded());
    assert_eq!(repo.get_calls(), 0, "no remote resolution needed");

    let commit = repo.last_commit();
    let PendingEntity::Create { draft, .. } = &commit[1] else {
        panic!("second entry must be a create");
    };
    assert_eq!(draft.parents, vec![LineageRef::Pending(0)]);

    let committed = repo.snapshot();
    assert_eq!(
        committed[1].parents,
        Relations::Known(vec!["/LAB/OBJ1".to_string()])
    );
}

/// Tenet: UPDATE merges properties. Listed keys are added or overwritten and
/// unlisted keys survive.
#[tokio::test]
async fn update_merges_properties_without_removing_existing_ones() {
    let repo = InMemoryRepository::new()
        .with_entity(project_view("/LAB/ALPHA").with_property("pi", "curie"));

    let request = validated(vec![Action::new(ActionType::Update, EntityKind::Project)
        .with_identifier(Identifier::path("/LAB/ALPHA"))
        .with_payload(
            Payload::default()
                .property("grant", "G-42")
                .described("funded project"),
        )]);

    let report = executor()
        .execute(request, &repo)
        .await
        .expect("batch must commit");

    assert!(report.all_succeeded());
    assert_eq!(report.outcomes[0].perm_id.as_deref(), Some("PROJ-ALPHA"));

    let entity = &repo.snapshot()[0];
    assert_eq!(entity.properties["pi"], "curie");
    assert_eq!(entity.properties["grant"], "G-42");
    assert_eq!(entity.description.as_deref(), Some("funded project"));
}

/// Tenet: dry_run validates and reports without a single repository call.
#[tokio::test]
async fn dry_run_never_touches_the_repository() {
    let repo = InMemoryRepository::new();
    let request = ActionRequest::new(vec![
        create_space("LAB"),
        Action::new(ActionType::Delete, EntityKind::Space)
            .with_identifier(Identifier::path("/OLD")),
    ])
    .with_dry_run(true)
    .validate()
    .expect("request must validate");

    let report = executor()
        .execute(request, &repo)
        .await
        .expect("dry run always succeeds");

    assert_eq!(report.state, BatchState::Validated);
    assert_eq!(repo.total_calls(), 0);
    assert!(report.all_succeeded());
    assert!(report.outcomes[0]
        .message
        .as_deref()
        .is_some_and(|m| m.contains("validated only")));
}

/// Tenet: a read-only batch needs no commit even in transactional mode.
#[tokio::test]
async fn read_only_batch_skips_the_commit_call() {
    let repo = InMemoryRepository::new().with_entity(space_view("LAB"));
    let request = validated(vec![
        Action::new(ActionType::Get, EntityKind::Space).with_identifier(Identifier::path("/LAB")),
        Action::new(ActionType::List, EntityKind::Space),
    ]);

    let report = executor()
        .execute(request, &repo)
        .await
        .expect("reads must succeed");

    assert_eq!(report.state, BatchState::Committed);
    assert_eq!(repo.commit_calls(), 0);
}

/// Tenet: a missing GET target is that action's own failure in
/// non-transactional mode, with not-found wording in the error.
#[tokio::test]
async fn missing_get_target_is_an_isolated_failure() {
    let repo = InMemoryRepository::new();
    let request = ActionRequest::new(vec![Action::new(ActionType::Get, EntityKind::Project)
        .with_identifier(Identifier::path("/LAB/NOPE"))])
    .with_transaction(false)
    .validate()
    .expect("request must validate");

    let report = executor()
        .execute(request, &repo)
        .await
        .expect("non-transactional batches never abort");

    assert_eq!(report.succeeded, 0);
    assert!(report.outcomes[0]
        .error
        .as_deref()
        .is_some_and(|e| e.contains("not found")));
}
