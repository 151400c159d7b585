//! Secondary effects of a committed transition
//!
//! Version snapshots and notifications are submitted to a bounded channel
//! and performed by a single worker task, each with its own exponential
//! backoff. The request path only ever enqueues; nothing here can change
//! the outcome of a transition.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;
use tracing::{debug, error, info, warn};

use crate::config::EffectsConfig;
use crate::ledger::VersionSnapshotter;
use crate::notify::{NotificationDispatcher, StatusChangeEvent};
use crate::observability::workflow_metrics;
use crate::store::VersionRecord;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EffectError {
    #[error("side-effect queue is full")]
    QueueFull,
    #[error("side-effect worker has stopped")]
    WorkerStopped,
}

#[derive(Debug)]
pub enum SideEffect {
    Snapshot(VersionRecord),
    Notify(StatusChangeEvent),
    /// Acknowledged once every effect submitted before it has been handled
    Flush(oneshot::Sender<()>),
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl From<&EffectsConfig> for RetryPolicy {
    fn from(config: &EffectsConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
        }
    }
}

impl RetryPolicy {
    /// Delays between attempts: base, 2x base, 4x base ... capped, jittered
    fn delays(&self) -> impl Iterator<Item = Duration> {
        let factor = (self.base_delay.as_millis() as u64 / 2).max(1);
        ExponentialBackoff::from_millis(2)
            .factor(factor)
            .max_delay(self.max_delay)
            .map(jitter)
            .take(self.max_attempts.saturating_sub(1) as usize)
    }
}

/// Submission side, cloned into every executor
#[derive(Debug, Clone)]
pub struct EffectQueue {
    sender: mpsc::Sender<SideEffect>,
}

impl EffectQueue {
    /// Enqueue without waiting
    pub fn submit(&self, effect: SideEffect) -> Result<(), EffectError> {
        self.sender.try_send(effect).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => EffectError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => EffectError::WorkerStopped,
        })
    }

    /// Wait until everything submitted so far has been handled
    pub async fn flush(&self) -> Result<(), EffectError> {
        let (ack, done) = oneshot::channel();
        self.sender
            .send(SideEffect::Flush(ack))
            .await
            .map_err(|_| EffectError::WorkerStopped)?;
        done.await.map_err(|_| EffectError::WorkerStopped)
    }
}

pub struct EffectWorker {
    receiver: mpsc::Receiver<SideEffect>,
    snapshots: Arc<dyn VersionSnapshotter>,
    dispatcher: Option<Arc<dyn NotificationDispatcher>>,
    retry: RetryPolicy,
}

/// Create a queue and the worker that drains it
pub fn effect_channel(
    capacity: usize,
    snapshots: Arc<dyn VersionSnapshotter>,
    dispatcher: Option<Arc<dyn NotificationDispatcher>>,
    retry: RetryPolicy,
) -> (EffectQueue, EffectWorker) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    let worker = EffectWorker {
        receiver,
        snapshots,
        dispatcher,
        retry,
    };
    (EffectQueue { sender }, worker)
}

impl EffectWorker {
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Handle effects in submission order until every queue handle is dropped
    pub async fn run(mut self) {
        info!(max_attempts = self.retry.max_attempts, "Side-effect worker started");
        while let Some(effect) = self.receiver.recv().await {
            self.handle(effect).await;
        }
        info!("Side-effect worker stopped");
    }

    async fn handle(&self, effect: SideEffect) {
        match effect {
            SideEffect::Snapshot(record) => self.write_snapshot(record).await,
            SideEffect::Notify(event) => self.notify(event).await,
            SideEffect::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }

    async fn write_snapshot(&self, record: VersionRecord) {
        let result = Retry::spawn(self.retry.delays(), || async {
            self.snapshots.append(&record).await.map_err(|e| {
                warn!(
                    story_id = %record.story_id,
                    version = record.version_number,
                    error = %e,
                    "Version snapshot write failed"
                );
                e
            })
        })
        .await;

        match result {
            Ok(()) => {
                workflow_metrics().record_snapshot_written();
                debug!(
                    story_id = %record.story_id,
                    version = record.version_number,
                    "Version snapshot written"
                );
            }
            Err(e) => {
                workflow_metrics().record_effect_failed();
                error!(
                    story_id = %record.story_id,
                    version = record.version_number,
                    error = %e,
                    "Giving up on version snapshot"
                );
            }
        }
    }

    async fn notify(&self, event: StatusChangeEvent) {
        let Some(dispatcher) = &self.dispatcher else {
            debug!(story_id = %event.story_id, "Notifications disabled, dropping event");
            return;
        };

        let result = Retry::spawn(self.retry.delays(), || async {
            dispatcher.dispatch(&event).await.map_err(|e| {
                warn!(story_id = %event.story_id, error = %e, "Notification dispatch failed");
                e
            })
        })
        .await;

        if let Err(e) = result {
            workflow_metrics().record_effect_failed();
            error!(
                story_id = %event.story_id,
                new_status = %event.new_status,
                error = %e,
                "Giving up on notification dispatch"
            );
        }
    }
}
