//! Functional tests for reference resolution and response normalization.
//!
//! Resolution maps textual references onto concrete remote entities: path
//! shapes carry their kind, bare permanent ids are probed in a fixed order.
//! Normalization is the inverse of execution: it turns a remote entity back
//! into the canonical metadata/payload shape, and doing so twice must be
//! indistinguishable from doing it once.

use rda_engine::{
    normalize_entity, resolve_reference, EngineConfig, EntityView, Executor, ResolutionError,
};
use rda_schema::{Action, ActionRequest, ActionType, EntityKind, Identifier, Location, Payload};
use rda_test_utils::{experiment_view, object_view, project_view, InMemoryRepository};

fn executor() -> Executor {
    Executor::new(EngineConfig::new())
}

/// Tenet: an absolute path names its kind by segment count; the resolver
/// goes straight to the typed lookup.
#[tokio::test]
async fn path_references_resolve_by_shape() {
    let repo = InMemoryRepository::new()
        .with_entity(project_view("/LAB/ALPHA"))
        .with_entity(experiment_view("/LAB/ALPHA/EXP1"))
        .with_entity(object_view("/LAB/ALPHA/EXP1/OBJ1"));

    let project = resolve_reference(&repo, "/LAB/ALPHA").await.unwrap();
    assert_eq!(project.kind, Some(EntityKind::Project));

    let experiment = resolve_reference(&repo, "/LAB/ALPHA/EXP1").await.unwrap();
    assert_eq!(experiment.kind, Some(EntityKind::Experiment));

    let object = resolve_reference(&repo, "/LAB/ALPHA/EXP1/OBJ1").await.unwrap();
    assert_eq!(object.kind, Some(EntityKind::Object));
}

/// Tenet: an ambiguous permanent id resolves to the first kind in the probe
/// order that answers. Objects come before experiments.
#[tokio::test]
async fn ambiguous_perm_id_prefers_the_object_probe() {
    let shared = "SHARED-1";
    let repo = InMemoryRepository::new()
        .with_entity(
            EntityView::of_kind(EntityKind::Experiment).with_identity(shared, "/LAB/ALPHA/EXP1"),
        )
        .with_entity(
            EntityView::of_kind(EntityKind::Object).with_identity(shared, "/LAB/ALPHA/EXP1/OBJ1"),
        );

    let resolved = resolve_reference(&repo, shared).await.unwrap();
    assert_eq!(resolved.kind, Some(EntityKind::Object));
}

/// Tenet: a probe that errors is a miss, not a hard failure; later probes
/// still run and can succeed.
#[tokio::test]
async fn failed_probes_fall_through_to_later_kinds() {
    let repo = InMemoryRepository::new().with_entity(
        EntityView::of_kind(EntityKind::Project).with_identity("AMBIG-1", "/LAB/ALPHA"),
    );
    repo.fail_get_for(EntityKind::Object, "AMBIG-1");
    repo.fail_get_for(EntityKind::Experiment, "AMBIG-1");

    let resolved = resolve_reference(&repo, "AMBIG-1").await.unwrap();
    assert_eq!(resolved.kind, Some(EntityKind::Project));
}

/// Tenet: when nothing answers, the resolver reports the reference it could
/// not map instead of guessing.
#[tokio::test]
async fn unknown_reference_is_unresolved() {
    let repo = InMemoryRepository::new();
    let err = resolve_reference(&repo, "NO-SUCH-ID").await.unwrap_err();
    assert_eq!(
        err,
        ResolutionError::UnresolvedReference {
            reference: "NO-SUCH-ID".to_string(),
        }
    );
}

/// Tenet: a GET with a known entity kind uses one typed lookup, never the
/// generic probe sequence.
#[tokio::test]
async fn get_with_known_kind_uses_a_single_typed_lookup() {
    let repo = InMemoryRepository::new().with_entity(
        EntityView::of_kind(EntityKind::Dataset)
            .with_identity("DS-1", "DS-1")
            .with_code("DS-1"),
    );

    let request = ActionRequest::new(vec![Action::new(ActionType::Get, EntityKind::Dataset)
        .with_identifier(Identifier::perm_id("DS-1"))])
    .validate()
    .expect("request must validate");

    let report = executor().execute(request, &repo).await.unwrap();

    assert!(report.all_succeeded());
    assert_eq!(repo.get_calls(), 1);
}

/// Tenet: LIST with zero matches is an empty success, not an error.
#[tokio::test]
async fn empty_list_is_a_successful_zero_count() {
    let repo = InMemoryRepository::new();
    let request = ActionRequest::new(vec![Action::new(ActionType::List, EntityKind::Project)])
        .validate()
        .expect("request must validate");

    let report = executor().execute(request, &repo).await.unwrap();

    let outcome = &report.outcomes[0];
    assert!(outcome.success);
    assert_eq!(outcome.count, Some(0));
    assert_eq!(outcome.data, Some(serde_json::json!([])));
}

/// Tenet: round trip. Feeding a normalized entity's code, type, and
/// properties into a CREATE of the same kind yields a semantically
/// equivalent entity.
#[tokio::test]
async fn normalized_output_recreates_an_equivalent_entity() -> anyhow::Result<()> {
    let original = object_view("/LAB/ALPHA/EXP1/OBJ1")
        .with_type("CHEMICAL")
        .with_property("purity", "0.99")
        .with_property("vendor", "acme");
    let normalized = normalize_entity(&original)?;

    let payload = Payload {
        code: normalized.payload.code.clone(),
        type_code: normalized.payload.type_code.clone(),
        properties: normalized.payload.properties.clone(),
        ..Payload::default()
    };
    let request = ActionRequest::new(vec![Action::new(ActionType::Create, EntityKind::Object)
        .with_location(Location::in_experiment("/LAB/ALPHA/EXP1"))
        .with_payload(payload)])
    .validate()
    .expect("request must validate");

    let repo = InMemoryRepository::new();
    let report = executor().execute(request, &repo).await?;
    assert!(report.all_succeeded());

    let recreated = &repo.snapshot()[0];
    let renormalized = normalize_entity(recreated)?;
    assert_eq!(renormalized.entity, normalized.entity);
    assert_eq!(renormalized.payload.code, normalized.payload.code);
    assert_eq!(renormalized.payload.type_code, normalized.payload.type_code);
    assert_eq!(renormalized.payload.properties, normalized.payload.properties);
    Ok(())
}

/// Tenet: normalization is idempotent across the executor boundary. Two
/// GETs of an unchanged entity carry byte-identical data.
#[tokio::test]
async fn repeated_gets_of_an_unchanged_entity_are_identical() {
    let repo = InMemoryRepository::new().with_entity(
        project_view("/LAB/ALPHA").with_property("pi", "curie"),
    );

    let get = || {
        ActionRequest::new(vec![Action::new(ActionType::Get, EntityKind::Project)
            .with_identifier(Identifier::path("/LAB/ALPHA"))])
        .validate()
        .expect("request must validate")
    };

    let first = executor().execute(get(), &repo).await.unwrap();
    let second = executor().execute(get(), &repo).await.unwrap();

    assert_eq!(first.outcomes[0].data, second.outcomes[0].data);
}
