use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{info, warn};

#[cfg(feature = "database")]
use crate::database::DatabaseManager;
use crate::effects::EffectQueue;
use crate::observability::workflow_metrics;

/// Graceful shutdown coordinator for story-gate
///
/// Drains the side-effect queue within a deadline, stops the worker, then
/// closes the database pool.
pub struct ShutdownCoordinator {
    effects: Option<(EffectQueue, JoinHandle<()>)>,
    #[cfg(feature = "database")]
    database: Option<DatabaseManager>,
    flush_timeout: Duration,
}

impl ShutdownCoordinator {
    pub fn new(flush_timeout: Duration) -> Self {
        Self {
            effects: None,
            #[cfg(feature = "database")]
            database: None,
            flush_timeout,
        }
    }

    /// Queue to flush and the worker draining it. Every other clone of the
    /// queue must be dropped before `shutdown` for the worker to stop.
    pub fn with_effects(mut self, queue: EffectQueue, worker: JoinHandle<()>) -> Self {
        self.effects = Some((queue, worker));
        self
    }

    #[cfg(feature = "database")]
    pub fn with_database(mut self, database: DatabaseManager) -> Self {
        self.database = Some(database);
        self
    }

    pub async fn shutdown(self) {
        info!("Initiating graceful shutdown...");

        if let Some((queue, mut worker)) = self.effects {
            match timeout(self.flush_timeout, queue.flush()).await {
                Ok(Ok(())) => info!("Pending side effects flushed"),
                Ok(Err(e)) => warn!("Side-effect queue could not be flushed: {}", e),
                Err(_) => warn!(
                    timeout_secs = self.flush_timeout.as_secs(),
                    "Timed out flushing side effects"
                ),
            }
            drop(queue);

            if timeout(self.flush_timeout, &mut worker).await.is_err() {
                warn!("Side-effect worker did not stop in time, aborting");
                worker.abort();
            }
        }

        #[cfg(feature = "database")]
        if let Some(database) = self.database {
            database.shutdown().await;
        }

        workflow_metrics().log_stats();
        info!("Graceful shutdown completed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::{effect_channel, RetryPolicy, SideEffect};
    use crate::store::{MemoryBackend, VersionRecord};
    use chrono::Utc;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_pending_snapshots_land_before_shutdown_returns() {
        let backend = Arc::new(MemoryBackend::new());
        let (queue, worker) = effect_channel(8, backend.clone(), None, RetryPolicy::default());
        let handle = worker.spawn();

        for version in 2..=4 {
            queue
                .submit(SideEffect::Snapshot(VersionRecord {
                    id: uuid::Uuid::new_v4(),
                    story_id: "REQ-1".to_string(),
                    version_number: version,
                    snapshot: serde_json::json!({}),
                    change_summary: "Status changed".to_string(),
                    changed_fields: vec!["status".to_string()],
                    changed_by: "pm".to_string(),
                    changed_at: Utc::now(),
                }))
                .unwrap();
        }

        ShutdownCoordinator::new(Duration::from_secs(5))
            .with_effects(queue, handle)
            .shutdown()
            .await;
        assert_eq!(backend.version_count().await, 3);
    }
}
