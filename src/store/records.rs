// Records shared by the workflow core and the storage backends

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::workflow::{ApprovalDecision, ApprovalType, Role, StoryStatus};

/// First-entry timestamp per status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusTimestamps {
    pub draft_at: Option<DateTime<Utc>>,
    pub internal_review_at: Option<DateTime<Utc>>,
    pub pending_client_review_at: Option<DateTime<Utc>>,
    pub approved_at: Option<DateTime<Utc>>,
    pub in_development_at: Option<DateTime<Utc>>,
    pub in_uat_at: Option<DateTime<Utc>>,
    pub needs_discussion_at: Option<DateTime<Utc>>,
    pub out_of_scope_at: Option<DateTime<Utc>>,
}

impl StatusTimestamps {
    fn slot_mut(&mut self, status: StoryStatus) -> &mut Option<DateTime<Utc>> {
        match status {
            StoryStatus::Draft => &mut self.draft_at,
            StoryStatus::InternalReview => &mut self.internal_review_at,
            StoryStatus::PendingClientReview => &mut self.pending_client_review_at,
            StoryStatus::Approved => &mut self.approved_at,
            StoryStatus::InDevelopment => &mut self.in_development_at,
            StoryStatus::InUat => &mut self.in_uat_at,
            StoryStatus::NeedsDiscussion => &mut self.needs_discussion_at,
            StoryStatus::OutOfScope => &mut self.out_of_scope_at,
        }
    }

    pub fn get(&self, status: StoryStatus) -> Option<DateTime<Utc>> {
        match status {
            StoryStatus::Draft => self.draft_at,
            StoryStatus::InternalReview => self.internal_review_at,
            StoryStatus::PendingClientReview => self.pending_client_review_at,
            StoryStatus::Approved => self.approved_at,
            StoryStatus::InDevelopment => self.in_development_at,
            StoryStatus::InUat => self.in_uat_at,
            StoryStatus::NeedsDiscussion => self.needs_discussion_at,
            StoryStatus::OutOfScope => self.out_of_scope_at,
        }
    }

    /// Stamp `status` unless it was entered before. Returns whether it stamped.
    pub fn stamp(&mut self, status: StoryStatus, at: DateTime<Utc>) -> bool {
        let slot = self.slot_mut(status);
        if slot.is_some() {
            return false;
        }
        *slot = Some(at);
        true
    }
}

/// A regulated requirement record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Story {
    pub story_id: String,
    pub title: String,
    pub program_id: String,
    pub status: StoryStatus,
    pub version: i64,
    pub timestamps: StatusTimestamps,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub deleted_by: Option<String>,
}

impl Story {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Apply a committed status change in place
    pub fn apply(&mut self, update: &StatusUpdate) {
        self.status = update.status;
        self.version += 1;
        self.timestamps.stamp(update.status, update.changed_at);
        self.updated_at = update.changed_at;
    }
}

/// Input for creating a story
#[derive(Debug, Clone)]
pub struct NewStory {
    pub story_id: String,
    pub title: String,
    pub program_id: String,
    pub initial_status: StoryStatus,
}

impl NewStory {
    pub fn draft(story_id: &str, title: &str, program_id: &str) -> Self {
        Self {
            story_id: story_id.to_string(),
            title: title.to_string(),
            program_id: program_id.to_string(),
            initial_status: StoryStatus::Draft,
        }
    }
}

/// The conditional write behind a transition
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub story_id: String,
    pub expected_version: i64,
    pub status: StoryStatus,
    pub changed_at: DateTime<Utc>,
}

/// One entry of the approval ledger. Never updated once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRecord {
    pub id: Uuid,
    pub story_id: String,
    pub approved_by: String,
    pub approval_type: ApprovalType,
    pub status: ApprovalDecision,
    pub previous_status: StoryStatus,
    pub notes: Option<String>,
    pub approved_at: DateTime<Utc>,
}

/// Full copy of a story at one version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionRecord {
    pub id: Uuid,
    pub story_id: String,
    pub version_number: i64,
    pub snapshot: serde_json::Value,
    pub change_summary: String,
    pub changed_fields: Vec<String>,
    pub changed_by: String,
    pub changed_at: DateTime<Utc>,
}

/// Per-user notification switches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPreferences {
    pub email_enabled: bool,
    pub in_app_enabled: bool,
    pub status_changes: bool,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            email_enabled: true,
            in_app_enabled: true,
            status_changes: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub user_id: String,
    pub display_name: String,
    pub email: String,
    pub role: Role,
    pub active: bool,
    pub program_ids: Vec<String>,
    pub preferences: NotificationPreferences,
}

impl UserRecord {
    pub fn new(user_id: &str, role: Role) -> Self {
        Self {
            user_id: user_id.to_string(),
            display_name: user_id.to_string(),
            email: format!("{user_id}@example.com"),
            role,
            active: true,
            program_ids: Vec::new(),
            preferences: NotificationPreferences::default(),
        }
    }

    pub fn with_programs(mut self, programs: &[&str]) -> Self {
        self.program_ids = programs.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn assigned_to(&self, program_id: &str) -> bool {
        self.program_ids.iter().any(|p| p == program_id)
    }
}
