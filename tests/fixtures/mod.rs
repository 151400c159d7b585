//! Shared setup for workflow integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

use story_gate::effects::{effect_channel, EffectQueue, RetryPolicy};
use story_gate::notify::{
    ChannelKind, Notification, NotificationChannel, NotifyError, RoleBasedDispatcher,
};
use story_gate::store::{StatusTimestamps, Story, UserRecord};
use story_gate::{MemoryBackend, Role, StaticSession, StoryStatus, TransitionExecutor};

/// Captures every delivered notification
#[derive(Debug, Default)]
pub struct RecordingChannel {
    delivered: Mutex<Vec<(String, Notification)>>,
}

impl RecordingChannel {
    pub fn recipients(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .delivered
            .lock()
            .unwrap()
            .iter()
            .map(|(user_id, _)| user_id.clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn subjects(&self) -> Vec<String> {
        self.delivered
            .lock()
            .unwrap()
            .iter()
            .map(|(_, n)| n.subject.clone())
            .collect()
    }
}

#[async_trait]
impl NotificationChannel for RecordingChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Log
    }

    async fn deliver(
        &self,
        recipient: &UserRecord,
        notification: &Notification,
    ) -> Result<(), NotifyError> {
        self.delivered
            .lock()
            .unwrap()
            .push((recipient.user_id.clone(), notification.clone()));
        Ok(())
    }
}

/// One in-memory deployment: users, stories, ledgers and a running
/// side-effect worker
pub struct Harness {
    pub backend: Arc<MemoryBackend>,
    pub channel: Arc<RecordingChannel>,
    pub queue: EffectQueue,
    worker: JoinHandle<()>,
}

pub fn standard_users() -> Vec<UserRecord> {
    vec![
        UserRecord::new("admin", Role::Admin),
        UserRecord::new("portfolio", Role::PortfolioManager),
        UserRecord::new("pm", Role::ProgramManager).with_programs(&["PRG-1"]),
        UserRecord::new("pm-other", Role::ProgramManager).with_programs(&["PRG-2"]),
        UserRecord::new("ba", Role::BusinessAnalyst).with_programs(&["PRG-1"]),
        UserRecord::new("dev", Role::Developer).with_programs(&["PRG-1"]),
        UserRecord::new("uat", Role::UatManager).with_programs(&["PRG-1"]),
        UserRecord::new("viewer", Role::Viewer),
    ]
}

impl Harness {
    pub async fn new() -> Self {
        let backend = Arc::new(MemoryBackend::with_users(standard_users()).await);
        let channel = Arc::new(RecordingChannel::default());
        let dispatcher = RoleBasedDispatcher::new(backend.clone()).with_channel(channel.clone());

        let retry = RetryPolicy {
            max_attempts: 2,
            base_delay: std::time::Duration::from_millis(1),
            max_delay: std::time::Duration::from_millis(5),
        };
        let (queue, worker) = effect_channel(64, backend.clone(), Some(Arc::new(dispatcher)), retry);

        Self {
            backend,
            channel,
            queue,
            worker: worker.spawn(),
        }
    }

    pub fn executor(&self, user_id: &str) -> TransitionExecutor {
        TransitionExecutor::with_backend(
            Arc::new(StaticSession::user(user_id)),
            self.backend.clone(),
            self.queue.clone(),
        )
    }

    pub fn anonymous(&self) -> TransitionExecutor {
        TransitionExecutor::with_backend(
            Arc::new(StaticSession::anonymous()),
            self.backend.clone(),
            self.queue.clone(),
        )
    }

    /// Place a story directly, as if it had reached `status` at `version`
    pub async fn seed(&self, story_id: &str, status: StoryStatus, version: i64) -> Story {
        let created_at = Utc::now() - Duration::days(3);
        let mut timestamps = StatusTimestamps::default();
        timestamps.stamp(StoryStatus::Draft, created_at);
        timestamps.stamp(status, created_at + Duration::hours(1));

        let story = Story {
            story_id: story_id.to_string(),
            title: format!("Story {story_id}"),
            program_id: "PRG-1".to_string(),
            status,
            version,
            timestamps,
            created_by: "ba".to_string(),
            created_at,
            updated_at: created_at + Duration::hours(1),
            deleted_at: None,
            deleted_by: None,
        };
        self.backend.seed_story(story.clone()).await;
        story
    }

    pub async fn story(&self, story_id: &str) -> Story {
        story_gate::StoryStore::get(&*self.backend, story_id)
            .await
            .unwrap()
            .unwrap()
    }

    /// Wait for every queued snapshot and notification
    pub async fn flush(&self) {
        self.queue.flush().await.unwrap();
    }
}
