// Transition executor - precondition checks, the conditional write, and
// hand-off of secondary effects

use chrono::Utc;
use regex::Regex;
use serde::Serialize;
use std::sync::{Arc, LazyLock};
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

use super::errors::WorkflowError;
use super::guard;
use super::policy::TransitionRule;
use super::types::{ApprovalDecision, Role, StoryStatus};
use crate::effects::{EffectQueue, SideEffect};
use crate::ledger::{ApprovalLedger, VersionRecordBuilder, VersionSnapshotter};
use crate::notify::StatusChangeEvent;
use crate::observability::workflow_metrics;
use crate::store::{
    ApprovalRecord, NewStory, SessionProvider, StatusTimestamps, StatusUpdate, Story, StoryStore,
    UserDirectory, UserRecord, VersionRecord,
};
use crate::telemetry::{create_transition_span, generate_correlation_id};

/// Result of a transition request as reported to callers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransitionOutcome {
    pub success: bool,
    pub error: Option<String>,
    /// The committed row, on success
    pub story: Option<Story>,
}

impl TransitionOutcome {
    fn committed(story: Story) -> Self {
        Self {
            success: true,
            error: None,
            story: Some(story),
        }
    }

    fn refused(error: &WorkflowError) -> Self {
        Self {
            success: false,
            error: Some(error.to_string()),
            story: None,
        }
    }
}

pub struct TransitionExecutor {
    session: Arc<dyn SessionProvider>,
    users: Arc<dyn UserDirectory>,
    stories: Arc<dyn StoryStore>,
    approvals: Arc<dyn ApprovalLedger>,
    versions: Arc<dyn VersionSnapshotter>,
    effects: EffectQueue,
}

impl TransitionExecutor {
    pub fn new(
        session: Arc<dyn SessionProvider>,
        users: Arc<dyn UserDirectory>,
        stories: Arc<dyn StoryStore>,
        approvals: Arc<dyn ApprovalLedger>,
        versions: Arc<dyn VersionSnapshotter>,
        effects: EffectQueue,
    ) -> Self {
        Self {
            session,
            users,
            stories,
            approvals,
            versions,
            effects,
        }
    }

    /// Wire every port to one backend
    pub fn with_backend<B>(
        session: Arc<dyn SessionProvider>,
        backend: Arc<B>,
        effects: EffectQueue,
    ) -> Self
    where
        B: UserDirectory + StoryStore + ApprovalLedger + VersionSnapshotter + 'static,
    {
        Self::new(
            session,
            backend.clone(),
            backend.clone(),
            backend.clone(),
            backend,
            effects,
        )
    }

    /// Move a story to `target`. Never panics and never returns an error;
    /// refusals are reported in the outcome.
    pub async fn transition(
        &self,
        story_id: &str,
        target: &str,
        notes: Option<&str>,
    ) -> TransitionOutcome {
        match self.try_transition(story_id, target, notes).await {
            Ok(story) => TransitionOutcome::committed(story),
            Err(e) => TransitionOutcome::refused(&e),
        }
    }

    /// Typed form of [`transition`](Self::transition), returning the
    /// committed row
    pub async fn try_transition(
        &self,
        story_id: &str,
        target: &str,
        notes: Option<&str>,
    ) -> Result<Story, WorkflowError> {
        let correlation_id = generate_correlation_id();
        let span = create_transition_span("transition", story_id, Some(target), &correlation_id);

        async {
            let result = self.commit_transition(story_id, target, notes).await;
            match &result {
                Ok(_) => workflow_metrics().record_committed(),
                Err(WorkflowError::Conflict { .. }) => workflow_metrics().record_conflict(),
                Err(e) => {
                    workflow_metrics().record_rejected();
                    info!(kind = e.kind(), error = %e, "Transition refused");
                }
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn commit_transition(
        &self,
        story_id: &str,
        target: &str,
        notes: Option<&str>,
    ) -> Result<Story, WorkflowError> {
        let caller = self.resolve_caller().await?;
        let current = self.load_live_story(story_id).await?;

        let target: StoryStatus = target
            .parse()
            .map_err(|_| WorkflowError::transition_denied(caller.role))?;
        let rule = guard::authorize(current.status, target, caller.role)?;
        let notes = guard::check_notes(rule, notes)?;

        let changed_at = Utc::now();
        let update = StatusUpdate {
            story_id: current.story_id.clone(),
            expected_version: current.version,
            status: target,
            changed_at,
        };
        let approval = rule.approval_type.map(|approval_type| ApprovalRecord {
            id: Uuid::new_v4(),
            story_id: current.story_id.clone(),
            approved_by: caller.user_id.clone(),
            approval_type,
            status: ApprovalDecision::for_target(target),
            previous_status: current.status,
            notes: notes.map(str::to_string),
            approved_at: changed_at,
        });

        let updated = self
            .stories
            .apply_transition(&update, approval.as_ref())
            .await?;

        info!(
            story_id = %updated.story_id,
            from = %current.status,
            to = %updated.status,
            version = updated.version,
            actor = %caller.user_id,
            approval = ?rule.approval_type,
            "Transition committed"
        );

        self.submit_effects(&current, &updated, &caller.user_id, notes);
        Ok(updated)
    }

    /// Queue the version snapshot and the notification. Failures here are
    /// logged and counted only.
    fn submit_effects(&self, previous: &Story, updated: &Story, actor: &str, notes: Option<&str>) {
        match VersionRecordBuilder::new(updated, actor).after(previous) {
            Ok(record) => self.submit(SideEffect::Snapshot(record), &updated.story_id),
            Err(e) => {
                workflow_metrics().record_effect_failed();
                warn!(story_id = %updated.story_id, error = %e, "Could not build version snapshot");
            }
        }

        let event = StatusChangeEvent {
            story_id: updated.story_id.clone(),
            new_status: updated.status,
            program_id: updated.program_id.clone(),
            changed_by: actor.to_string(),
            notes: notes.map(str::to_string),
        };
        self.submit(SideEffect::Notify(event), &updated.story_id);
    }

    fn submit(&self, effect: SideEffect, story_id: &str) {
        if let Err(e) = self.effects.submit(effect) {
            workflow_metrics().record_effect_failed();
            warn!(story_id = %story_id, error = %e, "Dropped side effect");
        }
    }

    /// Create a story at version 1 together with its first snapshot
    pub async fn create_story(&self, new: NewStory) -> Result<Story, WorkflowError> {
        let caller = self.resolve_caller().await?;
        if !guard::can_create(caller.role) {
            return Err(WorkflowError::Authorization {
                action: "create".to_string(),
                role: caller.role,
            });
        }
        if new.initial_status != StoryStatus::Draft && caller.role != Role::Admin {
            return Err(WorkflowError::Authorization {
                action: format!("creating a story in {}", new.initial_status),
                role: caller.role,
            });
        }

        validate_story_id(&new.story_id)?;
        let title = new.title.trim();
        if title.is_empty() {
            return Err(WorkflowError::Validation("title must not be empty".to_string()));
        }
        let program_id = new.program_id.trim();
        if program_id.is_empty() {
            return Err(WorkflowError::Validation(
                "program id must not be empty".to_string(),
            ));
        }

        let now = Utc::now();
        let mut timestamps = StatusTimestamps::default();
        timestamps.stamp(new.initial_status, now);
        let story = Story {
            story_id: new.story_id,
            title: title.to_string(),
            program_id: program_id.to_string(),
            status: new.initial_status,
            version: 1,
            timestamps,
            created_by: caller.user_id.clone(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
            deleted_by: None,
        };
        let initial = VersionRecordBuilder::new(&story, &caller.user_id).initial()?;
        self.stories.insert(&story, &initial).await?;

        info!(
            story_id = %story.story_id,
            status = %story.status,
            actor = %caller.user_id,
            "Story created"
        );
        Ok(story)
    }

    /// Mark a live story deleted. The row and both ledgers stay.
    pub async fn soft_delete(&self, story_id: &str) -> Result<Story, WorkflowError> {
        let caller = self.resolve_caller().await?;
        let current = self.load_live_story(story_id).await?;
        guard::authorize_soft_delete(current.status, caller.role)?;

        let deleted = self
            .stories
            .soft_delete(story_id, current.version, &caller.user_id, Utc::now())
            .await?;
        info!(story_id = %story_id, actor = %caller.user_id, "Story soft-deleted");
        Ok(deleted)
    }

    /// Rules the caller may take from the story's current status
    pub async fn allowed_transitions(
        &self,
        story_id: &str,
    ) -> Result<Vec<&'static TransitionRule>, WorkflowError> {
        let caller = self.resolve_caller().await?;
        let story = self.load_live_story(story_id).await?;
        Ok(super::policy::get_allowed_transitions(
            story.status,
            Some(caller.role),
        ))
    }

    /// Approval ledger entries, oldest first. Deleted stories keep their trail.
    pub async fn approval_history(&self, story_id: &str) -> Result<Vec<ApprovalRecord>, WorkflowError> {
        self.resolve_caller().await?;
        self.load_any_story(story_id).await?;
        Ok(self.approvals.history(story_id).await?)
    }

    /// Version snapshots, ascending by version
    pub async fn version_history(&self, story_id: &str) -> Result<Vec<VersionRecord>, WorkflowError> {
        self.resolve_caller().await?;
        self.load_any_story(story_id).await?;
        Ok(self.versions.versions(story_id).await?)
    }

    /// Authenticated, known, active caller. Inactive users are treated as
    /// unknown.
    async fn resolve_caller(&self) -> Result<UserRecord, WorkflowError> {
        let user_id = self
            .session
            .current_user()
            .await
            .filter(|id| !id.trim().is_empty())
            .ok_or(WorkflowError::Authentication)?;

        let user = self
            .users
            .find_user(&user_id)
            .await?
            .filter(|user| user.active)
            .ok_or(WorkflowError::NotFound("user"))?;
        debug!(user_id = %user.user_id, role = %user.role, "Caller resolved");
        Ok(user)
    }

    async fn load_any_story(&self, story_id: &str) -> Result<Story, WorkflowError> {
        self.stories
            .get(story_id)
            .await?
            .ok_or(WorkflowError::NotFound("story"))
    }

    async fn load_live_story(&self, story_id: &str) -> Result<Story, WorkflowError> {
        let story = self.load_any_story(story_id).await?;
        if story.is_deleted() {
            return Err(WorkflowError::NotFound("story"));
        }
        Ok(story)
    }
}

/// Upper-case letters or digits, a hyphen, then digits: `REQ-0042`
fn validate_story_id(story_id: &str) -> Result<(), WorkflowError> {
    static PATTERN: LazyLock<Option<Regex>> =
        LazyLock::new(|| Regex::new(r"^[A-Z0-9]+-[0-9]+$").ok());

    match PATTERN.as_ref() {
        Some(pattern) if pattern.is_match(story_id) => Ok(()),
        _ => Err(WorkflowError::Validation(format!(
            "invalid story id: {story_id}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::{effect_channel, EffectWorker, RetryPolicy};
    use crate::store::{MemoryBackend, StaticSession};

    async fn backend() -> Arc<MemoryBackend> {
        let mut retired = UserRecord::new("retired", Role::Admin);
        retired.active = false;
        Arc::new(
            MemoryBackend::with_users(vec![
                UserRecord::new("admin", Role::Admin),
                UserRecord::new("pm", Role::ProgramManager).with_programs(&["PRG-1"]),
                UserRecord::new("viewer", Role::Viewer),
                retired,
            ])
            .await,
        )
    }

    fn executor(
        backend: &Arc<MemoryBackend>,
        user: Option<&str>,
    ) -> (TransitionExecutor, EffectWorker) {
        let (queue, worker) = effect_channel(16, backend.clone(), None, RetryPolicy::default());
        let session = Arc::new(StaticSession::new(user.map(str::to_string)));
        (
            TransitionExecutor::with_backend(session, backend.clone(), queue),
            worker,
        )
    }

    #[tokio::test]
    async fn test_anonymous_caller_is_rejected_first() {
        let backend = backend().await;
        let (executor, _worker) = executor(&backend, None);

        // story does not exist either; authentication is checked before it
        let outcome = executor.transition("REQ-404", "approved", None).await;
        assert!(!outcome.success);
        assert_eq!(outcome.error.as_deref(), Some("not authenticated"));
    }

    #[tokio::test]
    async fn test_inactive_and_unknown_users_are_not_found() {
        let backend = backend().await;
        for user in ["retired", "ghost"] {
            let (executor, _worker) = executor(&backend, Some(user));
            let err = executor.allowed_transitions("REQ-1").await.unwrap_err();
            assert_eq!(err.to_string(), "user not found");
        }
    }

    #[tokio::test]
    async fn test_unparsable_target_is_denied() {
        let backend = backend().await;
        let (executor, _worker) = executor(&backend, Some("pm"));
        executor
            .create_story(NewStory::draft("REQ-1", "Batch record export", "PRG-1"))
            .await
            .unwrap();

        let err = executor
            .try_transition("REQ-1", "shipped", None)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "transition not allowed for this role");
    }

    #[tokio::test]
    async fn test_create_story_writes_version_one() {
        let backend = backend().await;
        let (executor, _worker) = executor(&backend, Some("pm"));

        let story = executor
            .create_story(NewStory::draft("REQ-7", "  Audit export  ", "PRG-1"))
            .await
            .unwrap();
        assert_eq!(story.version, 1);
        assert_eq!(story.title, "Audit export");
        assert!(story.timestamps.draft_at.is_some());

        let versions = executor.version_history("REQ-7").await.unwrap();
        assert_eq!(versions.len(), 1);
        assert_eq!(versions[0].version_number, 1);
    }

    #[tokio::test]
    async fn test_create_story_validation() {
        let backend = backend().await;
        let (executor, _worker) = executor(&backend, Some("pm"));

        let err = executor
            .create_story(NewStory::draft("req 7", "Audit", "PRG-1"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "validation");

        executor
            .create_story(NewStory::draft("REQ-7", "Audit", "PRG-1"))
            .await
            .unwrap();
        let err = executor
            .create_story(NewStory::draft("REQ-7", "Audit again", "PRG-1"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "story REQ-7 already exists");

        let mut approved = NewStory::draft("REQ-8", "Legacy import", "PRG-1");
        approved.initial_status = StoryStatus::Approved;
        let err = executor.create_story(approved).await.unwrap_err();
        assert_eq!(err.kind(), "authorization");
    }

    #[tokio::test]
    async fn test_viewer_cannot_create() {
        let backend = backend().await;
        let (executor, _worker) = executor(&backend, Some("viewer"));
        let err = executor
            .create_story(NewStory::draft("REQ-1", "Anything", "PRG-1"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "create not allowed for this role");
    }

    #[tokio::test]
    async fn test_soft_delete_guards() {
        let backend = backend().await;
        let (pm, _w1) = executor(&backend, Some("pm"));
        let (admin, _w2) = executor(&backend, Some("admin"));
        pm.create_story(NewStory::draft("REQ-1", "Label printing", "PRG-1"))
            .await
            .unwrap();

        let err = pm.soft_delete("REQ-1").await.unwrap_err();
        assert_eq!(err.to_string(), "delete not allowed for this role");

        let deleted = admin.soft_delete("REQ-1").await.unwrap();
        assert_eq!(deleted.deleted_by.as_deref(), Some("admin"));

        let outcome = pm.transition("REQ-1", "internal_review", None).await;
        assert_eq!(outcome.error.as_deref(), Some("story not found"));

        // the trail outlives the story
        assert_eq!(admin.version_history("REQ-1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_protected_status_cannot_be_deleted() {
        let backend = backend().await;
        let (admin, _worker) = executor(&backend, Some("admin"));
        let mut new = NewStory::draft("REQ-2", "Serialization", "PRG-1");
        new.initial_status = StoryStatus::InDevelopment;
        admin.create_story(new).await.unwrap();

        let err = admin.soft_delete("REQ-2").await.unwrap_err();
        assert_eq!(err.to_string(), "a story in In Development cannot be deleted");
    }

    #[tokio::test]
    async fn test_allowed_transitions_follow_role() {
        let backend = backend().await;
        let (pm, _w1) = executor(&backend, Some("pm"));
        let (viewer, _w2) = executor(&backend, Some("viewer"));
        pm.create_story(NewStory::draft("REQ-3", "Recall notice", "PRG-1"))
            .await
            .unwrap();

        let targets: Vec<StoryStatus> = pm
            .allowed_transitions("REQ-3")
            .await
            .unwrap()
            .iter()
            .map(|rule| rule.to)
            .collect();
        assert_eq!(
            targets,
            vec![
                StoryStatus::InternalReview,
                StoryStatus::NeedsDiscussion,
                StoryStatus::OutOfScope
            ]
        );
        assert!(viewer.allowed_transitions("REQ-3").await.unwrap().is_empty());
    }

    #[test]
    fn test_story_id_format() {
        assert!(validate_story_id("REQ-0042").is_ok());
        assert!(validate_story_id("A1-9").is_ok());
        assert!(validate_story_id("req-1").is_err());
        assert!(validate_story_id("REQ-").is_err());
        assert!(validate_story_id("REQ-1a").is_err());
    }
}
