//! Response normalization
//!
//! Converts a remote [`EntityView`] back into the canonical metadata and
//! payload shape, the inverse direction of action execution. Used for GET
//! and LIST results and for reporting what a batch created.

use crate::error::ResolutionError;
use crate::repository::EntityView;
use rda_schema::{ActionType, EntityKind, Metadata, Payload};
use serde::Serialize;

/// A remote entity in the canonical response shape
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedEntity {
    /// Always [`ActionType::Get`]; the shape doubles as a GET response
    pub action: ActionType,
    /// Kind of the entity
    pub entity: EntityKind,
    /// Server-populated metadata
    pub metadata: Metadata,
    /// The entity body
    pub payload: Payload,
}

impl NormalizedEntity {
    /// This entity as a JSON value
    #[must_use]
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Normalize a remote entity view.
///
/// The kind is taken from the view when declared, otherwise inferred from
/// the shape of the hierarchical identifier. Relationship lists are
/// auxiliary: when their retrieval failed they normalize to empty lists.
/// The function is pure; the same view always yields the same output.
///
/// # Errors
/// [`ResolutionError::UnknownEntityType`] when the view declares no kind and
/// carries no identifier to infer one from.
pub fn normalize_entity(view: &EntityView) -> Result<NormalizedEntity, ResolutionError> {
    let entity = view
        .kind
        .or_else(|| view.identifier.as_deref().and_then(infer_kind))
        .ok_or_else(|| {
            ResolutionError::UnknownEntityType(
                "entity declares no kind and has no identifier".to_string(),
            )
        })?;

    let metadata = Metadata {
        perm_id: view.perm_id.clone().unwrap_or_default(),
        identifier: view.identifier.clone().unwrap_or_default(),
        registrator: view.registrator.clone(),
        registration_date: view.registration_date.clone(),
        modifier: view.modifier.clone(),
        modification_date: view.modification_date.clone(),
        frozen: view.frozen.frozen,
        frozen_for_children: view.frozen.for_children,
        frozen_for_parents: view.frozen.for_parents,
        frozen_for_data_sets: view.frozen.for_data_sets,
    };

    let payload = Payload {
        code: view.code.clone(),
        type_code: view.type_code.clone(),
        properties: view.properties.clone(),
        description: view.description.clone(),
        parents: view.parents.identifiers().to_vec(),
        children: view.children.identifiers().to_vec(),
        ..Payload::default()
    };

    Ok(NormalizedEntity {
        action: ActionType::Get,
        entity,
        metadata,
        payload,
    })
}

/// Kind implied by the segment count of a full identifier.
///
/// Counts raw `/`-split parts, so `/LAB` has two and names a space. Deeper
/// identifiers than an experiment's are objects.
fn infer_kind(identifier: &str) -> Option<EntityKind> {
    if identifier.is_empty() {
        return None;
    }
    match identifier.split('/').count() {
        2 => Some(EntityKind::Space),
        3 => Some(EntityKind::Project),
        4 => Some(EntityKind::Experiment),
        _ => Some(EntityKind::Object),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::Relations;

    #[test]
    fn declared_kind_wins_over_inference() {
        let view = EntityView::of_kind(EntityKind::Dataset).with_identity("PERM-1", "/LAB");
        let normalized = normalize_entity(&view).unwrap();
        assert_eq!(normalized.entity, EntityKind::Dataset);
    }

    #[test]
    fn kind_is_inferred_from_identifier_shape() {
        let cases = [
            ("/LAB", EntityKind::Space),
            ("/LAB/ALPHA", EntityKind::Project),
            ("/LAB/ALPHA/EXP1", EntityKind::Experiment),
            ("/LAB/ALPHA/EXP1/OBJ1", EntityKind::Object),
        ];
        for (identifier, expected) in cases {
            let view = EntityView {
                perm_id: Some("PERM-1".to_string()),
                identifier: Some(identifier.to_string()),
                ..EntityView::default()
            };
            assert_eq!(normalize_entity(&view).unwrap().entity, expected, "{identifier}");
        }
    }

    #[test]
    fn kindless_view_without_identifier_is_an_error() {
        let view = EntityView::default();
        assert!(matches!(
            normalize_entity(&view),
            Err(ResolutionError::UnknownEntityType(_))
        ));
    }

    #[test]
    fn unavailable_relations_become_empty_lists() {
        let view = EntityView {
            parents: Relations::Unavailable,
            children: Relations::Unavailable,
            ..EntityView::of_kind(EntityKind::Object).with_identity("PERM-1", "/LAB/A/E/O")
        };
        let normalized = normalize_entity(&view).unwrap();
        assert!(normalized.payload.parents.is_empty());
        assert!(normalized.payload.children.is_empty());
    }

    #[test]
    fn normalization_is_idempotent() {
        let view = EntityView::of_kind(EntityKind::Project)
            .with_identity("PERM-7", "/LAB/ALPHA")
            .with_code("ALPHA")
            .with_property("pi", "curie");
        let first = normalize_entity(&view).unwrap().to_value();
        let second = normalize_entity(&view).unwrap().to_value();
        assert_eq!(first, second);
    }
}
