// Role-based recipient resolution and per-recipient delivery

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{
    roles_notified_for, ChannelKind, DispatchSummary, Notification, NotificationChannel,
    NotificationDispatcher, NotifyError, StatusChangeEvent,
};
use crate::observability::workflow_metrics;
use crate::store::{UserDirectory, UserRecord};

pub struct RoleBasedDispatcher {
    directory: Arc<dyn UserDirectory>,
    channels: Vec<Arc<dyn NotificationChannel>>,
}

impl RoleBasedDispatcher {
    pub fn new(directory: Arc<dyn UserDirectory>) -> Self {
        Self {
            directory,
            channels: Vec::new(),
        }
    }

    pub fn with_channel(mut self, channel: Arc<dyn NotificationChannel>) -> Self {
        self.channels.push(channel);
        self
    }

    /// Users who should hear about `event`, plus how many role holders
    /// were filtered out
    pub async fn resolve_recipients(
        &self,
        event: &StatusChangeEvent,
    ) -> Result<(Vec<UserRecord>, usize), NotifyError> {
        let roles = roles_notified_for(event.new_status);
        let candidates = self.directory.active_users_with_roles(roles).await?;
        let total = candidates.len();

        let recipients: Vec<UserRecord> = candidates
            .into_iter()
            .filter(|user| user.user_id != event.changed_by)
            .filter(|user| !user.role.is_program_scoped() || user.assigned_to(&event.program_id))
            .filter(|user| user.preferences.status_changes)
            .collect();

        let skipped = total - recipients.len();
        Ok((recipients, skipped))
    }
}

fn channel_enabled(user: &UserRecord, kind: ChannelKind) -> bool {
    match kind {
        ChannelKind::Email => user.preferences.email_enabled,
        ChannelKind::InApp => user.preferences.in_app_enabled,
        ChannelKind::Log => true,
    }
}

#[async_trait]
impl NotificationDispatcher for RoleBasedDispatcher {
    async fn dispatch(&self, event: &StatusChangeEvent) -> Result<DispatchSummary, NotifyError> {
        let (recipients, skipped) = self.resolve_recipients(event).await?;
        let notification = Notification::for_event(event);
        let mut summary = DispatchSummary {
            skipped,
            ..Default::default()
        };

        for recipient in &recipients {
            for channel in &self.channels {
                if !channel_enabled(recipient, channel.kind()) {
                    debug!(
                        recipient = %recipient.user_id,
                        channel = ?channel.kind(),
                        "Channel disabled by recipient preference"
                    );
                    continue;
                }
                summary.attempted += 1;
                match channel.deliver(recipient, &notification).await {
                    Ok(()) => {
                        summary.delivered += 1;
                        workflow_metrics().record_notification_delivered();
                    }
                    Err(e) => {
                        summary.failed += 1;
                        workflow_metrics().record_notification_failed();
                        warn!(
                            recipient = %recipient.user_id,
                            channel = ?channel.kind(),
                            story_id = %event.story_id,
                            error = %e,
                            "Notification delivery failed"
                        );
                    }
                }
            }
        }

        info!(
            story_id = %event.story_id,
            new_status = %event.new_status,
            attempted = summary.attempted,
            delivered = summary.delivered,
            failed = summary.failed,
            skipped = summary.skipped,
            "Status change dispatched"
        );
        Ok(summary)
    }
}
