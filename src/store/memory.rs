// In-process backend for every port - no side effects outside the process
//
// One lock guards stories and both ledgers, so a transition and its
// approval entry land together exactly as they do inside a SQLite
// transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

use super::{
    ApprovalRecord, StatusUpdate, Story, StoreError, StoryStore, UserDirectory, UserRecord,
    VersionRecord,
};
use crate::ledger::{ApprovalLedger, VersionSnapshotter};
use crate::workflow::Role;

#[derive(Debug, Default)]
struct MemoryState {
    stories: HashMap<String, Story>,
    approvals: Vec<ApprovalRecord>,
    versions: Vec<VersionRecord>,
    users: HashMap<String, UserRecord>,
}

#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: RwLock<MemoryState>,
    fail_version_writes: AtomicBool,
    fail_approval_writes: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn with_users(users: Vec<UserRecord>) -> Self {
        let backend = Self::new();
        for user in users {
            backend.add_user(user).await;
        }
        backend
    }

    pub async fn add_user(&self, user: UserRecord) {
        self.state
            .write()
            .await
            .users
            .insert(user.user_id.clone(), user);
    }

    /// Place a story as-is, without writing a version snapshot
    pub async fn seed_story(&self, story: Story) {
        self.state
            .write()
            .await
            .stories
            .insert(story.story_id.clone(), story);
    }

    /// Make every version snapshot write fail until switched off
    pub fn set_fail_version_writes(&self, fail: bool) {
        self.fail_version_writes.store(fail, Ordering::SeqCst);
    }

    /// Make every approval ledger write fail until switched off
    pub fn set_fail_approval_writes(&self, fail: bool) {
        self.fail_approval_writes.store(fail, Ordering::SeqCst);
    }

    pub async fn approval_count(&self) -> usize {
        self.state.read().await.approvals.len()
    }

    pub async fn version_count(&self) -> usize {
        self.state.read().await.versions.len()
    }

    fn check_approval_write(&self) -> Result<(), StoreError> {
        if self.fail_approval_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("approval ledger offline".to_string()));
        }
        Ok(())
    }

    fn check_version_write(&self) -> Result<(), StoreError> {
        if self.fail_version_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("version store offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl StoryStore for MemoryBackend {
    async fn get(&self, story_id: &str) -> Result<Option<Story>, StoreError> {
        Ok(self.state.read().await.stories.get(story_id).cloned())
    }

    async fn insert(&self, story: &Story, initial_version: &VersionRecord) -> Result<(), StoreError> {
        self.check_version_write()?;
        let mut state = self.state.write().await;
        if state.stories.contains_key(&story.story_id) {
            return Err(StoreError::DuplicateStory(story.story_id.clone()));
        }
        state.stories.insert(story.story_id.clone(), story.clone());
        state.versions.push(initial_version.clone());
        Ok(())
    }

    async fn apply_transition(
        &self,
        update: &StatusUpdate,
        approval: Option<&ApprovalRecord>,
    ) -> Result<Story, StoreError> {
        if approval.is_some() {
            self.check_approval_write()?;
        }
        let mut state = self.state.write().await;
        let story = state
            .stories
            .get_mut(&update.story_id)
            .ok_or_else(|| StoreError::StoryNotFound(update.story_id.clone()))?;
        if story.version != update.expected_version || story.is_deleted() {
            return Err(StoreError::VersionConflict {
                story_id: update.story_id.clone(),
                expected_version: update.expected_version,
            });
        }
        story.apply(update);
        let updated = story.clone();
        if let Some(record) = approval {
            state.approvals.push(record.clone());
        }
        Ok(updated)
    }

    async fn soft_delete(
        &self,
        story_id: &str,
        expected_version: i64,
        deleted_by: &str,
        deleted_at: DateTime<Utc>,
    ) -> Result<Story, StoreError> {
        let mut state = self.state.write().await;
        let story = state
            .stories
            .get_mut(story_id)
            .ok_or_else(|| StoreError::StoryNotFound(story_id.to_string()))?;
        if story.version != expected_version || story.is_deleted() {
            return Err(StoreError::VersionConflict {
                story_id: story_id.to_string(),
                expected_version,
            });
        }
        story.deleted_at = Some(deleted_at);
        story.deleted_by = Some(deleted_by.to_string());
        story.updated_at = deleted_at;
        Ok(story.clone())
    }
}

#[async_trait]
impl ApprovalLedger for MemoryBackend {
    async fn append(&self, record: &ApprovalRecord) -> Result<(), StoreError> {
        self.check_approval_write()?;
        self.state.write().await.approvals.push(record.clone());
        Ok(())
    }

    async fn history(&self, story_id: &str) -> Result<Vec<ApprovalRecord>, StoreError> {
        let state = self.state.read().await;
        let mut records: Vec<ApprovalRecord> = state
            .approvals
            .iter()
            .filter(|record| record.story_id == story_id)
            .cloned()
            .collect();
        // stable sort keeps insertion order for equal timestamps
        records.sort_by_key(|record| record.approved_at);
        Ok(records)
    }
}

#[async_trait]
impl VersionSnapshotter for MemoryBackend {
    async fn append(&self, record: &VersionRecord) -> Result<(), StoreError> {
        self.check_version_write()?;
        self.state.write().await.versions.push(record.clone());
        Ok(())
    }

    async fn versions(&self, story_id: &str) -> Result<Vec<VersionRecord>, StoreError> {
        let state = self.state.read().await;
        let mut records: Vec<VersionRecord> = state
            .versions
            .iter()
            .filter(|record| record.story_id == story_id)
            .cloned()
            .collect();
        records.sort_by_key(|record| record.version_number);
        Ok(records)
    }

    async fn get_version(&self, story_id: &str, version: i64) -> Result<Option<VersionRecord>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .versions
            .iter()
            .find(|record| record.story_id == story_id && record.version_number == version)
            .cloned())
    }
}

#[async_trait]
impl UserDirectory for MemoryBackend {
    async fn find_user(&self, user_id: &str) -> Result<Option<UserRecord>, StoreError> {
        Ok(self.state.read().await.users.get(user_id).cloned())
    }

    async fn active_users_with_roles(&self, roles: &[Role]) -> Result<Vec<UserRecord>, StoreError> {
        let state = self.state.read().await;
        let mut users: Vec<UserRecord> = state
            .users
            .values()
            .filter(|user| user.active && roles.contains(&user.role))
            .cloned()
            .collect();
        users.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        Ok(users)
    }

    async fn upsert_user(&self, user: &UserRecord) -> Result<(), StoreError> {
        self.add_user(user.clone()).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StatusTimestamps;
    use crate::workflow::StoryStatus;

    fn story(version: i64) -> Story {
        let now = Utc::now();
        Story {
            story_id: "REQ-9".to_string(),
            title: "Signature manifest".to_string(),
            program_id: "PRG-1".to_string(),
            status: StoryStatus::Draft,
            version,
            timestamps: StatusTimestamps::default(),
            created_by: "alice".to_string(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
            deleted_by: None,
        }
    }

    fn update(expected_version: i64) -> StatusUpdate {
        StatusUpdate {
            story_id: "REQ-9".to_string(),
            expected_version,
            status: StoryStatus::InternalReview,
            changed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_stale_version_is_a_conflict() {
        let backend = MemoryBackend::new();
        backend.seed_story(story(2)).await;

        let updated = backend.apply_transition(&update(2), None).await.unwrap();
        assert_eq!(updated.version, 3);

        let err = backend.apply_transition(&update(2), None).await.unwrap_err();
        assert!(matches!(err, StoreError::VersionConflict { expected_version: 2, .. }));
        assert_eq!(StoryStore::get(&backend, "REQ-9").await.unwrap().unwrap().version, 3);
    }

    #[tokio::test]
    async fn test_failed_approval_write_leaves_story_untouched() {
        let backend = MemoryBackend::new();
        backend.seed_story(story(1)).await;
        backend.set_fail_approval_writes(true);

        let approval = ApprovalRecord {
            id: uuid::Uuid::new_v4(),
            story_id: "REQ-9".to_string(),
            approved_by: "pm".to_string(),
            approval_type: crate::workflow::ApprovalType::InternalReview,
            status: crate::workflow::ApprovalDecision::Approved,
            previous_status: StoryStatus::Draft,
            notes: None,
            approved_at: Utc::now(),
        };
        assert!(backend.apply_transition(&update(1), Some(&approval)).await.is_err());

        let stored = StoryStore::get(&backend, "REQ-9").await.unwrap().unwrap();
        assert_eq!(stored.version, 1);
        assert_eq!(stored.status, StoryStatus::Draft);
        assert_eq!(backend.approval_count().await, 0);
    }

    #[tokio::test]
    async fn test_deleted_story_rejects_updates() {
        let backend = MemoryBackend::new();
        backend.seed_story(story(1)).await;
        backend
            .soft_delete("REQ-9", 1, "admin", Utc::now())
            .await
            .unwrap();

        let err = backend.apply_transition(&update(1), None).await.unwrap_err();
        assert!(matches!(err, StoreError::VersionConflict { .. }));
    }
}
