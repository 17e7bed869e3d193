//! Execution results
//!
//! Per-action outcome records and the batch-level report the executor
//! returns. Outcomes serialize in the wire shape callers persist for audit
//! trails.

use rda_schema::{ActionRequest, ActionType, EntityKind};
use serde::Serialize;

/// Lifecycle of one batch through the executor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BatchState {
    /// Constructed, not yet validated
    Pending,
    /// Passed validation; nothing executed yet
    Validated,
    /// Actions are being dispatched
    Executing,
    /// All work persisted (or nothing needed persisting)
    Committed,
    /// The batch was abandoned and pending work discarded
    Aborted,
}

/// Result record for one action
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionOutcome {
    /// The operation that ran
    pub action: ActionType,
    /// The entity kind it targeted
    pub entity: EntityKind,
    /// Whether the action succeeded
    pub success: bool,
    /// Informational message on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Error message on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Code of a created entity, known before commit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Permanent id, back-filled after commit
    #[serde(rename = "permId", skip_serializing_if = "Option::is_none")]
    pub perm_id: Option<String>,
    /// Full identifier, back-filled after commit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    /// Number of entries in `data`, LIST only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    /// Normalized entity data, GET and LIST only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ActionOutcome {
    /// Successful outcome with no data attached yet
    #[must_use]
    pub fn success(action: ActionType, entity: EntityKind) -> Self {
        Self {
            action,
            entity,
            success: true,
            message: None,
            error: None,
            code: None,
            perm_id: None,
            identifier: None,
            count: None,
            data: None,
        }
    }

    /// Failed outcome carrying the error text
    #[must_use]
    pub fn failure(action: ActionType, entity: EntityKind, error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::success(action, entity)
        }
    }

    /// With an informational message
    #[inline]
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// With the created entity's code
    #[inline]
    #[must_use]
    pub fn with_code(mut self, code: Option<String>) -> Self {
        self.code = code;
        self
    }

    /// With normalized data
    #[inline]
    #[must_use]
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    /// With a LIST entry count
    #[inline]
    #[must_use]
    pub fn with_count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }

    /// With the target's identifier
    #[inline]
    #[must_use]
    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    /// Back-fill committed identity
    #[must_use]
    pub fn with_committed(mut self, perm_id: impl Into<String>, identifier: impl Into<String>) -> Self {
        self.perm_id = Some(perm_id.into());
        self.identifier = Some(identifier.into());
        self
    }

    /// This outcome as a JSON value
    #[must_use]
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// What the executor hands back for one batch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionReport {
    /// Final state of the batch
    pub state: BatchState,
    /// One outcome per dispatched action, in order
    pub outcomes: Vec<ActionOutcome>,
    /// Number of successful actions
    pub succeeded: usize,
    /// The consumed request, per-action result fields populated
    pub request: ActionRequest,
}

impl ExecutionReport {
    /// Whether every action succeeded
    #[inline]
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.succeeded == self.outcomes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_serializes_in_wire_shape() {
        let outcome = ActionOutcome::success(ActionType::List, EntityKind::Project)
            .with_count(0)
            .with_data(serde_json::json!([]));
        let json = outcome.to_value();
        assert_eq!(json["action"], "LIST");
        assert_eq!(json["entity"], "PROJECT");
        assert_eq!(json["success"], true);
        assert_eq!(json["count"], 0);
        assert_eq!(json["data"], serde_json::json!([]));
        assert!(json.get("error").is_none());
    }

    #[test]
    fn committed_identity_uses_perm_id_key() {
        let outcome = ActionOutcome::success(ActionType::Create, EntityKind::Space)
            .with_committed("PERM-1", "/LAB");
        let json = outcome.to_value();
        assert_eq!(json["permId"], "PERM-1");
        assert_eq!(json["identifier"], "/LAB");
    }
}
