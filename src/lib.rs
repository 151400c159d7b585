// story-gate - regulated story workflow
// This exposes the core components for the CLI, testing and integration

pub mod config;
#[cfg(feature = "database")]
pub mod database;
pub mod effects;
pub mod ledger;
pub mod notify;
pub mod observability;
pub mod shutdown;
pub mod store;
pub mod telemetry;
pub mod workflow;

// Re-export key types for easy access
pub use config::{config, StoryGateConfig};
#[cfg(feature = "database")]
pub use database::{DatabaseManager, InAppChannel, SqliteBackend};
pub use effects::{effect_channel, EffectQueue, EffectWorker, RetryPolicy, SideEffect};
pub use ledger::{ApprovalLedger, VersionSnapshotter};
pub use notify::{NotificationChannel, NotificationDispatcher, RoleBasedDispatcher, StatusChangeEvent};
pub use observability::{workflow_metrics, OperationTimer, WorkflowMetrics};
pub use shutdown::ShutdownCoordinator;
pub use store::{MemoryBackend, SessionProvider, StaticSession, StoreError, StoryStore, UserDirectory};
pub use telemetry::{create_transition_span, generate_correlation_id, init_telemetry};
pub use workflow::{
    ApprovalDecision, ApprovalType, Role, StoryStatus, TransitionExecutor, TransitionOutcome,
    TransitionRule, WorkflowError,
};
