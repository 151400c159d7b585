use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

use story_gate::config::{ChannelSelection, StoryGateConfig};
use story_gate::database::{DatabaseManager, SqliteBackend};
use story_gate::effects::{effect_channel, RetryPolicy};
use story_gate::notify::{NotificationChannel, NotificationDispatcher, RoleBasedDispatcher, TracingChannel};
use story_gate::store::StaticSession;
use story_gate::{ShutdownCoordinator, TransitionExecutor};

pub mod audit;
pub mod policy;
pub mod stories;
pub mod users;

/// Everything a command needs, opened once per invocation
pub struct App {
    pub executor: TransitionExecutor,
    pub backend: Arc<SqliteBackend>,
    shutdown: ShutdownCoordinator,
}

impl App {
    pub async fn open(config: &StoryGateConfig, user: Option<String>) -> Result<Self> {
        let database = DatabaseManager::from_config(&config.database).await?;
        let backend = Arc::new(database.backend());

        let dispatcher: Option<Arc<dyn NotificationDispatcher>> = if config.notifications.enabled {
            let mut dispatcher = RoleBasedDispatcher::new(backend.clone());
            let channels: Vec<Arc<dyn NotificationChannel>> = match config.notifications.channel {
                ChannelSelection::Log => vec![Arc::new(TracingChannel)],
                ChannelSelection::InApp => vec![Arc::new(database.in_app_channel())],
                ChannelSelection::Both => vec![
                    Arc::new(TracingChannel),
                    Arc::new(database.in_app_channel()),
                ],
            };
            for channel in channels {
                dispatcher = dispatcher.with_channel(channel);
            }
            Some(Arc::new(dispatcher))
        } else {
            None
        };

        let (queue, worker) = effect_channel(
            config.effects.queue_capacity,
            backend.clone(),
            dispatcher,
            RetryPolicy::from(&config.effects),
        );
        let worker = worker.spawn();

        let executor = TransitionExecutor::with_backend(
            Arc::new(StaticSession::new(user)),
            backend.clone(),
            queue.clone(),
        );
        let shutdown = ShutdownCoordinator::new(Duration::from_secs(
            config.effects.flush_timeout_seconds,
        ))
        .with_effects(queue, worker)
        .with_database(database);

        Ok(Self {
            executor,
            backend,
            shutdown,
        })
    }

    /// Drain pending effects and close the database
    pub async fn close(self) {
        let App {
            executor, shutdown, ..
        } = self;
        drop(executor);
        shutdown.shutdown().await;
    }
}
