// Authorization guards - pure checks over the transition policy

use super::errors::WorkflowError;
use super::policy::{self, TransitionRule};
use super::types::{Role, StoryStatus};

/// Statuses in which a story can no longer be deleted
pub const PROTECTED_STATUSES: [StoryStatus; 3] = [
    StoryStatus::Approved,
    StoryStatus::InDevelopment,
    StoryStatus::InUat,
];

/// The rule permitting `role` to move a story from `from` to `to`
pub fn authorize(
    from: StoryStatus,
    to: StoryStatus,
    role: Role,
) -> Result<&'static TransitionRule, WorkflowError> {
    policy::get_allowed_transitions(from, Some(role))
        .into_iter()
        .find(|rule| rule.to == to)
        .ok_or_else(|| WorkflowError::transition_denied(role))
}

/// Enforce the notes requirement. Returns the trimmed notes, with blank
/// input collapsed to `None`.
pub fn check_notes<'a>(
    rule: &TransitionRule,
    notes: Option<&'a str>,
) -> Result<Option<&'a str>, WorkflowError> {
    let notes = notes.map(str::trim).filter(|n| !n.is_empty());
    if rule.requires_notes && notes.is_none() {
        return Err(WorkflowError::notes_required());
    }
    Ok(notes)
}

/// Only admins delete, and never once a story is approved or in delivery
pub fn authorize_soft_delete(status: StoryStatus, role: Role) -> Result<(), WorkflowError> {
    if role != Role::Admin {
        return Err(WorkflowError::Authorization {
            action: "delete".to_string(),
            role,
        });
    }
    if PROTECTED_STATUSES.contains(&status) {
        return Err(WorkflowError::Validation(format!(
            "a story in {status} cannot be deleted"
        )));
    }
    Ok(())
}

/// A role may create stories iff it can move one out of Draft
pub fn can_create(role: Role) -> bool {
    !policy::get_allowed_transitions(StoryStatus::Draft, Some(role)).is_empty()
}
