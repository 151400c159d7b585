// Append-only audit trails
//
// The approval ledger is the authoritative compliance record. Version
// snapshots are a secondary trail for human-readable history.

pub mod versions;

use async_trait::async_trait;

use crate::store::{ApprovalRecord, StoreError, VersionRecord};

pub use versions::{diff_snapshots, summarize_transition, VersionRecordBuilder};

/// Approval/rejection events. There is no update or delete.
#[async_trait]
pub trait ApprovalLedger: Send + Sync {
    async fn append(&self, record: &ApprovalRecord) -> Result<(), StoreError>;

    /// Entries for one story, oldest first
    async fn history(&self, story_id: &str) -> Result<Vec<ApprovalRecord>, StoreError>;
}

/// Per-version story snapshots. There is no update or delete.
#[async_trait]
pub trait VersionSnapshotter: Send + Sync {
    async fn append(&self, record: &VersionRecord) -> Result<(), StoreError>;

    /// Snapshots for one story, ascending by version
    async fn versions(&self, story_id: &str) -> Result<Vec<VersionRecord>, StoreError>;

    async fn get_version(&self, story_id: &str, version: i64) -> Result<Option<VersionRecord>, StoreError>;
}
