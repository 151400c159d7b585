use thiserror::Error;

use super::types::Role;
use crate::store::StoreError;

/// Why a workflow operation was refused or failed. The `Display` text is
/// what callers see.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("not authenticated")]
    Authentication,

    #[error("{action} not allowed for this role")]
    Authorization { action: String, role: Role },

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Validation(String),

    #[error("story {story_id} was changed by someone else (expected version {expected_version}); reload and try again")]
    Conflict {
        story_id: String,
        expected_version: i64,
    },

    #[error("persistence failure: {0}")]
    Persistence(StoreError),
}

impl WorkflowError {
    pub fn transition_denied(role: Role) -> Self {
        WorkflowError::Authorization {
            action: "transition".to_string(),
            role,
        }
    }

    pub fn notes_required() -> Self {
        WorkflowError::Validation("notes required for this transition".to_string())
    }

    /// Stable tag for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            WorkflowError::Authentication => "authentication",
            WorkflowError::Authorization { .. } => "authorization",
            WorkflowError::NotFound(_) => "not_found",
            WorkflowError::Validation(_) => "validation",
            WorkflowError::Conflict { .. } => "conflict",
            WorkflowError::Persistence(_) => "persistence",
        }
    }
}

impl From<StoreError> for WorkflowError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::VersionConflict {
                story_id,
                expected_version,
            } => WorkflowError::Conflict {
                story_id,
                expected_version,
            },
            StoreError::StoryNotFound(_) => WorkflowError::NotFound("story"),
            StoreError::DuplicateStory(story_id) => {
                WorkflowError::Validation(format!("story {story_id} already exists"))
            }
            other => WorkflowError::Persistence(other),
        }
    }
}
