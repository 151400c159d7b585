use async_trait::async_trait;
use tracing::info;

use super::{ChannelKind, Notification, NotificationChannel, NotifyError};
use crate::store::UserRecord;

/// Writes each notification as a structured log line
#[derive(Debug, Default, Clone)]
pub struct TracingChannel;

#[async_trait]
impl NotificationChannel for TracingChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Log
    }

    async fn deliver(
        &self,
        recipient: &UserRecord,
        notification: &Notification,
    ) -> Result<(), NotifyError> {
        info!(
            recipient = %recipient.user_id,
            email = %recipient.email,
            story_id = %notification.story_id,
            subject = %notification.subject,
            "Status change notification"
        );
        Ok(())
    }
}
