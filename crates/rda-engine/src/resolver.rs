//! Entity reference resolution
//!
//! Maps a textual reference onto a concrete remote entity. Absolute paths
//! carry their kind in their shape; anything else is treated as a permanent
//! id and probed against a fixed sequence of kinds.

use crate::error::ResolutionError;
use crate::repository::{EntityView, Repository};
use rda_schema::EntityKind;

/// Probe sequence for bare permanent ids.
///
/// Permanent ids share one namespace across kinds, so an ambiguous id
/// resolves to whichever kind answers first. The order puts the most common
/// lineage targets first.
pub const PERM_ID_PROBE_ORDER: [EntityKind; 4] = [
    EntityKind::Object,
    EntityKind::Experiment,
    EntityKind::Project,
    EntityKind::Dataset,
];

/// Kind implied by the shape of an absolute path reference.
///
/// Two segments name a project, three an experiment, four or more an
/// object. Single-segment paths and non-path strings return `None` and go
/// through the permanent-id probe instead.
#[must_use]
pub fn classify_path(reference: &str) -> Option<EntityKind> {
    if !reference.starts_with('/') {
        return None;
    }
    let segments = reference.split('/').skip(1).filter(|s| !s.is_empty()).count();
    match segments {
        2 => Some(EntityKind::Project),
        3 => Some(EntityKind::Experiment),
        n if n >= 4 => Some(EntityKind::Object),
        _ => None,
    }
}

/// Resolve a reference to the remote entity it names.
///
/// # Errors
/// [`ResolutionError::UnresolvedReference`] when no lookup succeeds.
pub async fn resolve_reference(
    repo: &dyn Repository,
    reference: &str,
) -> Result<EntityView, ResolutionError> {
    if let Some(kind) = classify_path(reference) {
        return match repo.get(kind, reference).await {
            Ok(Some(view)) => Ok(view),
            Ok(None) => Err(unresolved(reference)),
            Err(err) => {
                tracing::debug!("typed lookup of {reference} as {kind} failed: {err}");
                Err(unresolved(reference))
            }
        };
    }

    for kind in PERM_ID_PROBE_ORDER {
        match repo.get(kind, reference).await {
            Ok(Some(view)) => return Ok(view),
            Ok(None) => {}
            Err(err) => {
                // A failed probe is a miss, not a hard error.
                tracing::debug!("probe of {reference} as {kind} failed: {err}");
            }
        }
    }

    Err(unresolved(reference))
}

fn unresolved(reference: &str) -> ResolutionError {
    ResolutionError::UnresolvedReference {
        reference: reference.to_string(),
    }
}
