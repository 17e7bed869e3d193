//! Request validation
//!
//! Turns a raw [`ActionRequest`] into a [`ValidatedRequest`], the only input
//! type the execution layer accepts. Validation is pure: it inspects and
//! normalizes the request in memory and never contacts the repository.
//!
//! Rules run in a fixed order:
//! 1. the batch must be non-empty
//! 2. every identifier must carry at least one usable reference
//! 3. locations get their derivable ancestors filled in (never fails)
//! 4. per-action required fields by action type
//! 5. DELETE must not share an entity key with any other action

use crate::error::ValidationError;
use crate::types::{Action, ActionRequest, ActionType, EntityKind};
use std::collections::HashMap;

/// A request that has passed all schema and batch-consistency checks.
///
/// Can only be obtained through [`ActionRequest::validate`]; holding one is
/// proof that per-action required fields are present and that the batch is
/// free of DELETE conflicts.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRequest {
    inner: ActionRequest,
}

impl ValidatedRequest {
    /// The validated actions, in execution order
    #[inline]
    #[must_use]
    pub fn actions(&self) -> &[Action] {
        &self.inner.actions
    }

    /// Whether this request is validate-only
    #[inline]
    #[must_use]
    pub fn is_dry_run(&self) -> bool {
        self.inner.dry_run
    }

    /// Whether destructive actions commit as one unit
    #[inline]
    #[must_use]
    pub fn is_transactional(&self) -> bool {
        self.inner.transaction
    }

    /// Borrow the underlying request
    #[inline]
    #[must_use]
    pub fn request(&self) -> &ActionRequest {
        &self.inner
    }

    /// Consume the wrapper, yielding the normalized request
    #[inline]
    #[must_use]
    pub fn into_inner(self) -> ActionRequest {
        self.inner
    }
}

impl ActionRequest {
    /// Validate this request, producing the form the executor accepts.
    ///
    /// Locations are normalized in place (derivable ancestors filled in)
    /// as part of validation, so the returned request may differ from the
    /// input in those fields.
    ///
    /// # Errors
    /// Returns the first [`ValidationError`] encountered, in rule order.
    pub fn validate(mut self) -> Result<ValidatedRequest, ValidationError> {
        if self.actions.is_empty() {
            return Err(ValidationError::EmptyRequest);
        }

        for (i, action) in self.actions.iter_mut().enumerate() {
            let index = i + 1;

            if let Some(identifier) = &action.identifier {
                if !identifier.is_usable() {
                    return Err(ValidationError::MissingIdentifier { index });
                }
            }

            if let Some(location) = &mut action.location {
                location.derive_ancestors();
            }

            check_required_fields(action, index)?;
        }

        check_delete_conflicts(&self.actions)?;

        Ok(ValidatedRequest { inner: self })
    }
}

fn check_required_fields(action: &Action, index: usize) -> Result<(), ValidationError> {
    let missing = |field: &'static str| ValidationError::MissingRequiredField {
        index,
        action: action.action,
        entity: action.entity,
        field,
    };

    match action.action {
        ActionType::Get | ActionType::Delete => {
            if action.identifier.is_none() {
                return Err(missing("identifier"));
            }
        }
        ActionType::Update => {
            if action.identifier.is_none() {
                return Err(missing("identifier"));
            }
            if action.payload.is_none() {
                return Err(missing("payload"));
            }
        }
        ActionType::Create => {
            // Spaces are root containers and need no location.
            if action.entity != EntityKind::Space
                && action.location.as_ref().map_or(true, |l| l.is_empty())
            {
                return Err(missing("location"));
            }
            if action.payload.is_none() {
                return Err(missing("payload"));
            }
        }
        ActionType::List => {}
    }

    Ok(())
}

fn check_delete_conflicts(actions: &[Action]) -> Result<(), ValidationError> {
    let mut seen: HashMap<String, &Action> = HashMap::new();

    for action in actions {
        let Some(key) = action.entity_key() else {
            continue;
        };
        if let Some(previous) = seen.get(key.as_str()) {
            if previous.action == ActionType::Delete || action.action == ActionType::Delete {
                return Err(ValidationError::ConflictingActions { key });
            }
        }
        seen.insert(key, action);
    }

    Ok(())
}
