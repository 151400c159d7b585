//! Regulated story workflow
//!
//! The policy table decides which status changes exist, the guard decides
//! whether a caller may take one, and the executor commits it.

pub mod errors;
pub mod executor;
pub mod guard;
pub mod policy;
pub mod types;

pub use errors::WorkflowError;
pub use executor::{TransitionExecutor, TransitionOutcome};
pub use policy::{StatusConfig, TransitionRule};
pub use types::{ApprovalDecision, ApprovalType, Role, StoryStatus, UnknownRole, UnknownStatus};
