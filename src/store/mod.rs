//! Collaborator ports and the records that flow through them
//!
//! The workflow core only ever talks to these traits. `memory` backs them
//! in-process; `crate::database` backs them with SQLite.

pub mod memory;
pub mod records;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::workflow::Role;

pub use memory::MemoryBackend;
pub use records::{
    ApprovalRecord, NewStory, NotificationPreferences, StatusTimestamps, StatusUpdate, Story,
    UserRecord, VersionRecord,
};

/// Failures reported by a storage backend
#[derive(Debug, Error)]
pub enum StoreError {
    #[cfg(feature = "database")]
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[cfg(feature = "database")]
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("story {0} not found")]
    StoryNotFound(String),

    #[error("story {0} already exists")]
    DuplicateStory(String),

    #[error("story {story_id} is no longer at version {expected_version}")]
    VersionConflict {
        story_id: String,
        expected_version: i64,
    },

    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Yields the identity of the current caller
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn current_user(&self) -> Option<String>;
}

/// Session with a fixed identity, e.g. from a CLI flag
#[derive(Debug, Clone, Default)]
pub struct StaticSession {
    user_id: Option<String>,
}

impl StaticSession {
    pub fn new(user_id: Option<String>) -> Self {
        Self { user_id }
    }

    pub fn user(user_id: &str) -> Self {
        Self::new(Some(user_id.to_string()))
    }

    pub fn anonymous() -> Self {
        Self::new(None)
    }
}

#[async_trait]
impl SessionProvider for StaticSession {
    async fn current_user(&self) -> Option<String> {
        self.user_id.clone()
    }
}

/// User and role lookup
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_user(&self, user_id: &str) -> Result<Option<UserRecord>, StoreError>;

    /// Active users holding any of `roles`
    async fn active_users_with_roles(&self, roles: &[Role]) -> Result<Vec<UserRecord>, StoreError>;

    async fn upsert_user(&self, user: &UserRecord) -> Result<(), StoreError>;
}

/// Story rows, keyed by `story_id`
#[async_trait]
pub trait StoryStore: Send + Sync {
    /// Fetch a story, soft-deleted or not
    async fn get(&self, story_id: &str) -> Result<Option<Story>, StoreError>;

    /// Insert a new story together with its version 1 snapshot
    async fn insert(&self, story: &Story, initial_version: &VersionRecord) -> Result<(), StoreError>;

    /// Conditionally apply a status change. The update only lands when the
    /// stored version still equals `update.expected_version` and the story
    /// is live; `approval` is appended in the same unit of work. Returns the
    /// post-update row.
    async fn apply_transition(
        &self,
        update: &StatusUpdate,
        approval: Option<&ApprovalRecord>,
    ) -> Result<Story, StoreError>;

    /// Mark a story deleted, guarded by the same version check
    async fn soft_delete(
        &self,
        story_id: &str,
        expected_version: i64,
        deleted_by: &str,
        deleted_at: DateTime<Utc>,
    ) -> Result<Story, StoreError>;
}
