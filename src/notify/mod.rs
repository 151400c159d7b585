//! Status-change notification fan-out
//!
//! The workflow core emits a [`StatusChangeEvent`] and never looks at what
//! happens next. Recipient resolution and delivery live here, and nothing
//! in this module can fail a transition.

pub mod channels;
pub mod dispatcher;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::{StoreError, UserRecord};
use crate::workflow::{Role, StoryStatus};

pub use channels::TracingChannel;
pub use dispatcher::RoleBasedDispatcher;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("recipient lookup failed: {0}")]
    Directory(#[from] StoreError),

    #[error("delivery to {recipient} failed: {reason}")]
    Delivery { recipient: String, reason: String },
}

/// Payload emitted after a committed transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusChangeEvent {
    pub story_id: String,
    pub new_status: StoryStatus,
    pub program_id: String,
    pub changed_by: String,
    pub notes: Option<String>,
}

/// Rendered message handed to a channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub story_id: String,
    pub subject: String,
    pub body: String,
}

impl Notification {
    pub fn for_event(event: &StatusChangeEvent) -> Self {
        let subject = format!("{} moved to {}", event.story_id, event.new_status);
        let mut body = format!(
            "Story {} in program {} was moved to {} by {}.",
            event.story_id, event.program_id, event.new_status, event.changed_by
        );
        if let Some(notes) = &event.notes {
            body.push_str("\n\nNotes: ");
            body.push_str(notes);
        }
        Self {
            story_id: event.story_id.clone(),
            subject,
            body,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Email,
    InApp,
    Log,
}

/// Aggregate delivery counts, for observability only
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub attempted: usize,
    pub delivered: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Roles to notify when a story enters `status`
pub fn roles_notified_for(status: StoryStatus) -> &'static [Role] {
    match status {
        StoryStatus::Draft => &[Role::BusinessAnalyst, Role::ProgramManager],
        StoryStatus::InternalReview => &[Role::ProgramManager, Role::PortfolioManager],
        StoryStatus::PendingClientReview => {
            &[Role::Admin, Role::PortfolioManager, Role::ProgramManager]
        }
        StoryStatus::Approved => &[Role::ProgramManager, Role::BusinessAnalyst, Role::Developer],
        StoryStatus::InDevelopment => &[Role::Developer, Role::ProgramManager],
        StoryStatus::InUat => &[Role::UatManager, Role::ProgramManager],
        StoryStatus::NeedsDiscussion => &[
            Role::PortfolioManager,
            Role::ProgramManager,
            Role::BusinessAnalyst,
        ],
        StoryStatus::OutOfScope => &[Role::PortfolioManager, Role::ProgramManager],
    }
}

/// Fans a status change out to subscribers
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    /// Fails only when recipients cannot be resolved; per-recipient delivery
    /// failures are counted in the summary.
    async fn dispatch(&self, event: &StatusChangeEvent) -> Result<DispatchSummary, NotifyError>;
}

/// One delivery mechanism (email, in-app, log)
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    fn kind(&self) -> ChannelKind;

    async fn deliver(
        &self,
        recipient: &UserRecord,
        notification: &Notification,
    ) -> Result<(), NotifyError>;
}
