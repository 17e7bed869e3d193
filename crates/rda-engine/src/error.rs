//! Execution-phase error types
//!
//! Covers everything that can go wrong after validation:
//! - Reference resolution failures
//! - Missing lookup targets
//! - Remote rejections
//! - Transactional aborts with cleanup diagnostics

use crate::repository::RepositoryError;
use crate::result::ActionOutcome;
use rda_schema::EntityKind;

/// A reference could not be mapped to a concrete remote entity
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolutionError {
    /// No entity of any probed kind answered to the reference
    #[error("could not resolve entity reference: {reference}")]
    UnresolvedReference {
        /// The reference string that failed to resolve
        reference: String,
    },

    /// A remote entity's kind could not be determined
    #[error("cannot determine entity type: {0}")]
    UnknownEntityType(String),
}

/// Failure of a single action during execution
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    /// A reference in the action could not be resolved
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// The lookup target does not exist
    #[error("{kind} not found: {reference}")]
    NotFound {
        /// Kind of the missing entity
        kind: EntityKind,
        /// Reference that was looked up
        reference: String,
    },

    /// The repository rejected the operation
    #[error(transparent)]
    Remote(#[from] RepositoryError),
}

/// One failed best-effort delete during abort cleanup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupFailure {
    /// Reference the engine tried to delete
    pub reference: String,
    /// Why the delete failed
    pub error: String,
}

/// A transactional batch was aborted.
///
/// Wraps the causing [`ActionError`], annotated with the 1-based index of
/// the failing action. Cleanup failures are carried as diagnostics and never
/// replace the original cause. `outcomes` holds the per-action records made
/// before the abort, including the failing action's own failure record.
#[derive(Debug, thiserror::Error)]
#[error("transaction aborted at action {action_index}: {source}")]
pub struct TransactionAbort {
    /// 1-based index of the action that caused the abort
    pub action_index: usize,
    /// The underlying failure
    #[source]
    pub source: ActionError,
    /// Best-effort cleanup failures, advisory only
    pub cleanup: Vec<CleanupFailure>,
    /// Outcomes recorded up to and including the failing action
    pub outcomes: Vec<ActionOutcome>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abort_message_carries_index_and_cause() {
        let abort = TransactionAbort {
            action_index: 2,
            source: ActionError::NotFound {
                kind: EntityKind::Project,
                reference: "/LAB/ALPHA".to_string(),
            },
            cleanup: Vec::new(),
            outcomes: Vec::new(),
        };
        assert_eq!(
            abort.to_string(),
            "transaction aborted at action 2: PROJECT not found: /LAB/ALPHA"
        );
    }
}
