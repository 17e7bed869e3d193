//! Operator-facing confirmation rendering
//!
//! Formats an [`ActionRequest`] as markdown for the approval step that sits
//! between planning and execution. The approval loop itself lives outside
//! this workspace; only the rendering is done here so every front end shows
//! the same text.

use crate::types::{Action, ActionRequest, ActionType};

/// Render a request as a markdown confirmation prompt.
///
/// One numbered line per action, a warning block when the request contains
/// destructive actions, and a note when multiple actions commit as a single
/// transaction.
#[must_use]
pub fn confirmation_summary(request: &ActionRequest) -> String {
    let mut lines = vec![
        "## Planned Actions".to_string(),
        String::new(),
        "I'm ready to perform the following operations:".to_string(),
        String::new(),
    ];

    for (i, action) in request.actions.iter().enumerate() {
        lines.push(format_action_line(action, i + 1));
        lines.push(String::new());
    }

    if request.has_destructive_actions() {
        lines.push(
            "**Warning**: this request includes operations that will modify the repository."
                .to_string(),
        );
        lines.push(String::new());
    }

    if request.transaction && request.actions.len() > 1 {
        lines.push(
            "All actions will be executed as a single transaction (all succeed or all fail)."
                .to_string(),
        );
        lines.push(String::new());
    }

    lines.push("**Please confirm:**".to_string());
    lines.push("- Type 'yes' to proceed with these actions".to_string());
    lines.push("- Type 'no' to cancel".to_string());
    lines.push("- Describe any changes you'd like me to make".to_string());

    lines.join("\n")
}

fn format_action_line(action: &Action, index: usize) -> String {
    let verb = match action.action {
        ActionType::Create => "Create",
        ActionType::Get => "Retrieve",
        ActionType::Update => "Update",
        ActionType::List => "List",
        ActionType::Delete => "Delete",
    };
    let entity = action.entity.label();

    match action.action {
        ActionType::Create => {
            let code = action
                .payload
                .as_ref()
                .and_then(|p| p.code.as_deref())
                .unwrap_or("AUTO_GENERATED");
            let type_code = action
                .payload
                .as_ref()
                .and_then(|p| p.type_code.as_deref())
                .unwrap_or("DEFAULT");

            let mut within = String::new();
            if let Some(location) = &action.location {
                if let Some(space) = &location.space {
                    within.push_str(&format!(" in Space `{space}`"));
                }
                if let Some(project) = &location.project {
                    within.push_str(&format!(" in Project `{project}`"));
                }
                if let Some(experiment) = &location.experiment {
                    within.push_str(&format!(" in Experiment `{experiment}`"));
                }
                if let Some(object) = &location.object {
                    within.push_str(&format!(" attached to Object `{object}`"));
                }
            }

            format!("{index}. **{verb} {entity}**: `{code}` (type: `{type_code}`){within}")
        }
        ActionType::Get | ActionType::Update | ActionType::Delete => {
            let reference = action
                .identifier
                .as_ref()
                .and_then(|id| id.display_reference())
                .unwrap_or("");
            format!("{index}. **{verb} {entity}**: `{reference}`")
        }
        ActionType::List => format!("{index}. **{verb} all {entity}s**"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EntityKind, Identifier, Location, Payload};

    #[test]
    fn renders_one_numbered_line_per_action() {
        let request = ActionRequest::new(vec![
            Action::new(ActionType::List, EntityKind::Space),
            Action::new(ActionType::Get, EntityKind::Project)
                .with_identifier(Identifier::path("/LAB/ALPHA")),
        ]);
        let text = confirmation_summary(&request);
        assert!(text.contains("1. **List all Spaces**"));
        assert!(text.contains("2. **Retrieve Project**: `/LAB/ALPHA`"));
    }

    #[test]
    fn create_line_shows_code_type_and_containment() {
        let request = ActionRequest::new(vec![Action::new(ActionType::Create, EntityKind::Object)
            .with_location(Location::in_experiment("/LAB/ALPHA/EXP1"))
            .with_payload(Payload::with_code("OBJ1").typed("CHEMICAL"))]);
        let text = confirmation_summary(&request);
        assert!(text.contains("**Create Sample/Object**: `OBJ1` (type: `CHEMICAL`)"));
        assert!(text.contains("in Experiment `/LAB/ALPHA/EXP1`"));
    }

    #[test]
    fn warning_appears_only_for_destructive_requests() {
        let read_only = ActionRequest::new(vec![Action::new(ActionType::List, EntityKind::Space)]);
        assert!(!confirmation_summary(&read_only).contains("**Warning**"));

        let destructive = ActionRequest::new(vec![Action::new(
            ActionType::Delete,
            EntityKind::Dataset,
        )
        .with_identifier(Identifier::perm_id("20240101-1"))]);
        assert!(confirmation_summary(&destructive).contains("**Warning**"));
    }

    #[test]
    fn transaction_note_requires_multiple_actions() {
        let single = ActionRequest::new(vec![Action::new(ActionType::Create, EntityKind::Space)
            .with_payload(Payload::with_code("LAB"))]);
        assert!(!confirmation_summary(&single).contains("single transaction"));

        let batch = ActionRequest::new(vec![
            Action::new(ActionType::Create, EntityKind::Space).with_payload(Payload::with_code("LAB")),
            Action::new(ActionType::Create, EntityKind::Project)
                .with_location(Location::in_space("/LAB"))
                .with_payload(Payload::with_code("ALPHA")),
        ]);
        assert!(confirmation_summary(&batch).contains("single transaction"));
    }
}
