//! Validation errors
//!
//! Every variant points at the offending part of a raw request. Validation
//! runs before any remote call, so these errors always describe the request
//! itself, never the repository.

use crate::types::{ActionType, EntityKind};

/// Schema or batch-consistency violation in a raw request
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// The request carries no actions at all
    #[error("request must contain at least one action")]
    EmptyRequest,

    /// An identifier has neither a permanent id nor a path
    #[error("action {index}: at least one of permId or identifier must be provided")]
    MissingIdentifier {
        /// 1-based index of the offending action
        index: usize,
    },

    /// An action is missing a field its type requires
    #[error("action {index}: {action} {entity} requires '{field}'")]
    MissingRequiredField {
        /// 1-based index of the offending action
        index: usize,
        /// The operation that imposes the requirement
        action: ActionType,
        /// The entity kind being operated on
        entity: EntityKind,
        /// Name of the missing field
        field: &'static str,
    },

    /// DELETE combined with another action on the same entity
    #[error("cannot combine DELETE with other actions on the same entity: {key}")]
    ConflictingActions {
        /// Shared entity key of the conflicting actions
        key: String,
    },
}
