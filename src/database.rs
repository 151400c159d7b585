use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{migrate::MigrateDatabase, Executor, QueryBuilder, Row, Sqlite, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::DatabaseConfig;
use crate::ledger::{ApprovalLedger, VersionSnapshotter};
use crate::notify::{ChannelKind, Notification, NotificationChannel, NotifyError};
use crate::store::{
    ApprovalRecord, NotificationPreferences, StatusTimestamps, StatusUpdate, Story, StoreError,
    StoryStore, UserDirectory, UserRecord, VersionRecord,
};
use crate::workflow::Role;

const STORY_COLUMNS: &str = "story_id, title, program_id, status, version, \
    draft_at, internal_review_at, pending_client_review_at, approved_at, \
    in_development_at, in_uat_at, needs_discussion_at, out_of_scope_at, \
    created_by, created_at, updated_at, deleted_at, deleted_by";

const USER_COLUMNS: &str = "user_id, display_name, email, role, active, program_ids, \
    email_enabled, in_app_enabled, status_changes";

const APPROVAL_COLUMNS: &str =
    "id, story_id, approved_by, approval_type, status, previous_status, notes, approved_at";

const VERSION_COLUMNS: &str = "id, story_id, version_number, snapshot, change_summary, \
    changed_fields, changed_by, changed_at";

/// Database manager for persistent state storage
pub struct DatabaseManager {
    pool: SqlitePool,
}

impl DatabaseManager {
    /// Open (creating if needed) and optionally migrate the database
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        auto_migrate: bool,
    ) -> Result<Self, StoreError> {
        if !Sqlite::database_exists(database_url).await? {
            info!("Creating database at {}", database_url);
            Sqlite::create_database(database_url).await?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect(database_url)
            .await?;

        if auto_migrate {
            info!("Running database migrations...");
            sqlx::migrate!("./migrations").run(&pool).await?;
            info!("Database migrations completed");
        }

        Ok(Self { pool })
    }

    pub async fn from_config(config: &DatabaseConfig) -> Result<Self, StoreError> {
        Self::new(&config.url, config.max_connections, config.auto_migrate).await
    }

    /// Get database pool for queries
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Backend implementing every storage port over this pool
    pub fn backend(&self) -> SqliteBackend {
        SqliteBackend {
            pool: self.pool.clone(),
        }
    }

    pub fn in_app_channel(&self) -> InAppChannel {
        InAppChannel {
            pool: self.pool.clone(),
        }
    }

    /// Close database connections gracefully
    pub async fn shutdown(&self) {
        info!("Shutting down database connections...");
        self.pool.close().await;
        info!("Database connections closed");
    }
}

/// SQLite implementation of the story, ledger and user ports
#[derive(Debug, Clone)]
pub struct SqliteBackend {
    pool: SqlitePool,
}

fn parse_column<T: FromStr>(raw: &str, what: &str) -> Result<T, StoreError> {
    raw.parse()
        .map_err(|_| StoreError::Corrupt(format!("unknown {what}: {raw}")))
}

fn parse_id(raw: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(raw).map_err(|e| StoreError::Corrupt(format!("bad record id {raw}: {e}")))
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn story_from_row(row: &SqliteRow) -> Result<Story, StoreError> {
    let status: String = row.try_get("status")?;
    Ok(Story {
        story_id: row.try_get("story_id")?,
        title: row.try_get("title")?,
        program_id: row.try_get("program_id")?,
        status: parse_column(&status, "status")?,
        version: row.try_get("version")?,
        timestamps: StatusTimestamps {
            draft_at: row.try_get("draft_at")?,
            internal_review_at: row.try_get("internal_review_at")?,
            pending_client_review_at: row.try_get("pending_client_review_at")?,
            approved_at: row.try_get("approved_at")?,
            in_development_at: row.try_get("in_development_at")?,
            in_uat_at: row.try_get("in_uat_at")?,
            needs_discussion_at: row.try_get("needs_discussion_at")?,
            out_of_scope_at: row.try_get("out_of_scope_at")?,
        },
        created_by: row.try_get("created_by")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        deleted_at: row.try_get("deleted_at")?,
        deleted_by: row.try_get("deleted_by")?,
    })
}

fn approval_from_row(row: &SqliteRow) -> Result<ApprovalRecord, StoreError> {
    let id: String = row.try_get("id")?;
    let approval_type: String = row.try_get("approval_type")?;
    let status: String = row.try_get("status")?;
    let previous_status: String = row.try_get("previous_status")?;
    Ok(ApprovalRecord {
        id: parse_id(&id)?,
        story_id: row.try_get("story_id")?,
        approved_by: row.try_get("approved_by")?,
        approval_type: parse_column(&approval_type, "approval type")?,
        status: parse_column(&status, "approval decision")?,
        previous_status: parse_column(&previous_status, "status")?,
        notes: row.try_get("notes")?,
        approved_at: row.try_get("approved_at")?,
    })
}

fn version_from_row(row: &SqliteRow) -> Result<VersionRecord, StoreError> {
    let id: String = row.try_get("id")?;
    let snapshot: String = row.try_get("snapshot")?;
    let changed_fields: String = row.try_get("changed_fields")?;
    Ok(VersionRecord {
        id: parse_id(&id)?,
        story_id: row.try_get("story_id")?,
        version_number: row.try_get("version_number")?,
        snapshot: serde_json::from_str(&snapshot)?,
        change_summary: row.try_get("change_summary")?,
        changed_fields: serde_json::from_str(&changed_fields)?,
        changed_by: row.try_get("changed_by")?,
        changed_at: row.try_get("changed_at")?,
    })
}

fn user_from_row(row: &SqliteRow) -> Result<UserRecord, StoreError> {
    let role: String = row.try_get("role")?;
    let program_ids: String = row.try_get("program_ids")?;
    Ok(UserRecord {
        user_id: row.try_get("user_id")?,
        display_name: row.try_get("display_name")?,
        email: row.try_get("email")?,
        role: parse_column(&role, "role")?,
        active: row.try_get("active")?,
        program_ids: serde_json::from_str(&program_ids)?,
        preferences: NotificationPreferences {
            email_enabled: row.try_get("email_enabled")?,
            in_app_enabled: row.try_get("in_app_enabled")?,
            status_changes: row.try_get("status_changes")?,
        },
    })
}

async fn fetch_story<'e, E>(executor: E, story_id: &str) -> Result<Option<Story>, StoreError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT {STORY_COLUMNS} FROM stories WHERE story_id = ?1");
    let row = sqlx::query(&sql)
        .bind(story_id)
        .fetch_optional(executor)
        .await?;
    row.as_ref().map(story_from_row).transpose()
}

async fn insert_approval<'e, E>(executor: E, record: &ApprovalRecord) -> Result<(), StoreError>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO story_approvals
            (id, story_id, approved_by, approval_type, status, previous_status, notes, approved_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(record.id.to_string())
    .bind(&record.story_id)
    .bind(&record.approved_by)
    .bind(record.approval_type.as_str())
    .bind(record.status.as_str())
    .bind(record.previous_status.as_str())
    .bind(&record.notes)
    .bind(record.approved_at)
    .execute(executor)
    .await?;
    Ok(())
}

async fn insert_version<'e, E>(executor: E, record: &VersionRecord) -> Result<(), StoreError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let snapshot = serde_json::to_string(&record.snapshot)?;
    let changed_fields = serde_json::to_string(&record.changed_fields)?;
    sqlx::query(
        r#"
        INSERT INTO story_versions
            (id, story_id, version_number, snapshot, change_summary, changed_fields, changed_by, changed_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(record.id.to_string())
    .bind(&record.story_id)
    .bind(record.version_number)
    .bind(snapshot)
    .bind(&record.change_summary)
    .bind(changed_fields)
    .bind(&record.changed_by)
    .bind(record.changed_at)
    .execute(executor)
    .await?;
    Ok(())
}

#[async_trait]
impl StoryStore for SqliteBackend {
    async fn get(&self, story_id: &str) -> Result<Option<Story>, StoreError> {
        fetch_story(&self.pool, story_id).await
    }

    async fn insert(&self, story: &Story, initial_version: &VersionRecord) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        let sql = format!(
            "INSERT INTO stories ({STORY_COLUMNS}) VALUES \
             (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)"
        );
        let ts = &story.timestamps;
        sqlx::query(&sql)
            .bind(&story.story_id)
            .bind(&story.title)
            .bind(&story.program_id)
            .bind(story.status.as_str())
            .bind(story.version)
            .bind(ts.draft_at)
            .bind(ts.internal_review_at)
            .bind(ts.pending_client_review_at)
            .bind(ts.approved_at)
            .bind(ts.in_development_at)
            .bind(ts.in_uat_at)
            .bind(ts.needs_discussion_at)
            .bind(ts.out_of_scope_at)
            .bind(&story.created_by)
            .bind(story.created_at)
            .bind(story.updated_at)
            .bind(story.deleted_at)
            .bind(&story.deleted_by)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::DuplicateStory(story.story_id.clone())
                } else {
                    StoreError::Database(e)
                }
            })?;

        insert_version(&mut *tx, initial_version).await?;
        tx.commit().await?;
        debug!(story_id = %story.story_id, "Story inserted");
        Ok(())
    }

    async fn apply_transition(
        &self,
        update: &StatusUpdate,
        approval: Option<&ApprovalRecord>,
    ) -> Result<Story, StoreError> {
        let mut tx = self.pool.begin().await?;

        // column name comes from the closed status enum, never from input
        let column = update.status.timestamp_column();
        let sql = format!(
            "UPDATE stories \
             SET status = ?1, version = version + 1, {column} = COALESCE({column}, ?2), updated_at = ?2 \
             WHERE story_id = ?3 AND version = ?4 AND deleted_at IS NULL"
        );
        let result = sqlx::query(&sql)
            .bind(update.status.as_str())
            .bind(update.changed_at)
            .bind(&update.story_id)
            .bind(update.expected_version)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            let exists = fetch_story(&mut *tx, &update.story_id).await?.is_some();
            tx.rollback().await?;
            return Err(if exists {
                StoreError::VersionConflict {
                    story_id: update.story_id.clone(),
                    expected_version: update.expected_version,
                }
            } else {
                StoreError::StoryNotFound(update.story_id.clone())
            });
        }

        if let Some(record) = approval {
            insert_approval(&mut *tx, record).await?;
        }

        let story = fetch_story(&mut *tx, &update.story_id)
            .await?
            .ok_or_else(|| StoreError::StoryNotFound(update.story_id.clone()))?;
        tx.commit().await?;
        Ok(story)
    }

    async fn soft_delete(
        &self,
        story_id: &str,
        expected_version: i64,
        deleted_by: &str,
        deleted_at: DateTime<Utc>,
    ) -> Result<Story, StoreError> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            r#"
            UPDATE stories
            SET deleted_at = ?1, deleted_by = ?2, updated_at = ?1
            WHERE story_id = ?3 AND version = ?4 AND deleted_at IS NULL
            "#,
        )
        .bind(deleted_at)
        .bind(deleted_by)
        .bind(story_id)
        .bind(expected_version)
        .execute(&mut *tx)
        .await?;

        let story = fetch_story(&mut *tx, story_id).await?;
        match (result.rows_affected(), story) {
            (0, Some(_)) => {
                tx.rollback().await?;
                Err(StoreError::VersionConflict {
                    story_id: story_id.to_string(),
                    expected_version,
                })
            }
            (_, None) => {
                tx.rollback().await?;
                Err(StoreError::StoryNotFound(story_id.to_string()))
            }
            (_, Some(story)) => {
                tx.commit().await?;
                Ok(story)
            }
        }
    }
}

#[async_trait]
impl ApprovalLedger for SqliteBackend {
    async fn append(&self, record: &ApprovalRecord) -> Result<(), StoreError> {
        insert_approval(&self.pool, record).await
    }

    async fn history(&self, story_id: &str) -> Result<Vec<ApprovalRecord>, StoreError> {
        let sql = format!(
            "SELECT {APPROVAL_COLUMNS} FROM story_approvals \
             WHERE story_id = ?1 ORDER BY approved_at ASC, rowid ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(story_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(approval_from_row).collect()
    }
}

#[async_trait]
impl VersionSnapshotter for SqliteBackend {
    async fn append(&self, record: &VersionRecord) -> Result<(), StoreError> {
        insert_version(&self.pool, record).await
    }

    async fn versions(&self, story_id: &str) -> Result<Vec<VersionRecord>, StoreError> {
        let sql = format!(
            "SELECT {VERSION_COLUMNS} FROM story_versions \
             WHERE story_id = ?1 ORDER BY version_number ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(story_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(version_from_row).collect()
    }

    async fn get_version(&self, story_id: &str, version: i64) -> Result<Option<VersionRecord>, StoreError> {
        let sql = format!(
            "SELECT {VERSION_COLUMNS} FROM story_versions \
             WHERE story_id = ?1 AND version_number = ?2"
        );
        let row = sqlx::query(&sql)
            .bind(story_id)
            .bind(version)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(version_from_row).transpose()
    }
}

#[async_trait]
impl UserDirectory for SqliteBackend {
    async fn find_user(&self, user_id: &str) -> Result<Option<UserRecord>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE user_id = ?1");
        let row = sqlx::query(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn active_users_with_roles(&self, roles: &[Role]) -> Result<Vec<UserRecord>, StoreError> {
        if roles.is_empty() {
            return Ok(Vec::new());
        }

        let mut query = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {USER_COLUMNS} FROM users WHERE active = 1 AND role IN ("
        ));
        let mut separated = query.separated(", ");
        for role in roles {
            separated.push_bind(role.as_str());
        }
        separated.push_unseparated(") ORDER BY user_id ASC");

        let rows = query.build().fetch_all(&self.pool).await?;
        rows.iter().map(user_from_row).collect()
    }

    async fn upsert_user(&self, user: &UserRecord) -> Result<(), StoreError> {
        let program_ids = serde_json::to_string(&user.program_ids)?;
        sqlx::query(
            r#"
            INSERT INTO users
                (user_id, display_name, email, role, active, program_ids,
                 email_enabled, in_app_enabled, status_changes)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT (user_id) DO UPDATE SET
                display_name = excluded.display_name,
                email = excluded.email,
                role = excluded.role,
                active = excluded.active,
                program_ids = excluded.program_ids,
                email_enabled = excluded.email_enabled,
                in_app_enabled = excluded.in_app_enabled,
                status_changes = excluded.status_changes
            "#,
        )
        .bind(&user.user_id)
        .bind(&user.display_name)
        .bind(&user.email)
        .bind(user.role.as_str())
        .bind(user.active)
        .bind(program_ids)
        .bind(user.preferences.email_enabled)
        .bind(user.preferences.in_app_enabled)
        .bind(user.preferences.status_changes)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// Stores notifications in the `notifications` table for in-app display
#[derive(Debug, Clone)]
pub struct InAppChannel {
    pool: SqlitePool,
}

impl InAppChannel {
    /// Unread notifications for a user, oldest first
    pub async fn unread(&self, user_id: &str) -> Result<Vec<Notification>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT story_id, subject, body
            FROM notifications
            WHERE user_id = ?1 AND read = 0
            ORDER BY id ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<Notification, StoreError> {
                Ok(Notification {
                    story_id: row.try_get("story_id")?,
                    subject: row.try_get("subject")?,
                    body: row.try_get("body")?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl NotificationChannel for InAppChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::InApp
    }

    async fn deliver(
        &self,
        recipient: &UserRecord,
        notification: &Notification,
    ) -> Result<(), NotifyError> {
        sqlx::query(
            r#"
            INSERT INTO notifications (user_id, story_id, subject, body, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&recipient.user_id)
        .bind(&notification.story_id)
        .bind(&notification.subject)
        .bind(&notification.body)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| NotifyError::Delivery {
            recipient: recipient.user_id.clone(),
            reason: e.to_string(),
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::VersionRecordBuilder;
    use crate::workflow::{ApprovalDecision, ApprovalType, StoryStatus};
    use tempfile::TempDir;

    async fn manager() -> (DatabaseManager, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("story-gate.db").display());
        let manager = DatabaseManager::new(&url, 2, true).await.unwrap();
        (manager, dir)
    }

    fn draft(story_id: &str) -> Story {
        let now = Utc::now();
        let mut timestamps = StatusTimestamps::default();
        timestamps.stamp(StoryStatus::Draft, now);
        Story {
            story_id: story_id.to_string(),
            title: "Electronic signature capture".to_string(),
            program_id: "PRG-1".to_string(),
            status: StoryStatus::Draft,
            version: 1,
            timestamps,
            created_by: "ba".to_string(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
            deleted_by: None,
        }
    }

    async fn insert_draft(backend: &SqliteBackend, story_id: &str) -> Story {
        let story = draft(story_id);
        let initial = VersionRecordBuilder::new(&story, "ba").initial().unwrap();
        backend.insert(&story, &initial).await.unwrap();
        story
    }

    fn update(story_id: &str, expected_version: i64, status: StoryStatus) -> StatusUpdate {
        StatusUpdate {
            story_id: story_id.to_string(),
            expected_version,
            status,
            changed_at: Utc::now(),
        }
    }

    fn approval(story_id: &str) -> ApprovalRecord {
        ApprovalRecord {
            id: Uuid::new_v4(),
            story_id: story_id.to_string(),
            approved_by: "pm".to_string(),
            approval_type: ApprovalType::InternalReview,
            status: ApprovalDecision::Approved,
            previous_status: StoryStatus::InternalReview,
            notes: Some("looks complete".to_string()),
            approved_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_insert_round_trip_and_duplicate() {
        let (manager, _dir) = manager().await;
        let backend = manager.backend();
        let story = insert_draft(&backend, "REQ-1").await;

        let loaded = StoryStore::get(&backend, "REQ-1").await.unwrap().unwrap();
        assert_eq!(loaded.status, StoryStatus::Draft);
        assert_eq!(loaded.version, 1);
        assert_eq!(loaded.title, story.title);
        assert!(loaded.timestamps.draft_at.is_some());
        assert_eq!(backend.versions("REQ-1").await.unwrap().len(), 1);

        let again = draft("REQ-1");
        let initial = VersionRecordBuilder::new(&again, "ba").initial().unwrap();
        let err = backend.insert(&again, &initial).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateStory(id) if id == "REQ-1"));

        manager.shutdown().await;
    }

    #[tokio::test]
    async fn test_conditional_update_and_approval_commit_together() {
        let (manager, _dir) = manager().await;
        let backend = manager.backend();
        insert_draft(&backend, "REQ-2").await;

        let story = backend
            .apply_transition(&update("REQ-2", 1, StoryStatus::InternalReview), None)
            .await
            .unwrap();
        assert_eq!(story.version, 2);
        let first_entry = story.timestamps.internal_review_at.unwrap();

        let story = backend
            .apply_transition(
                &update("REQ-2", 2, StoryStatus::PendingClientReview),
                Some(&approval("REQ-2")),
            )
            .await
            .unwrap();
        assert_eq!(story.version, 3);

        // stale version: no write, no approval
        let err = backend
            .apply_transition(
                &update("REQ-2", 2, StoryStatus::InternalReview),
                Some(&approval("REQ-2")),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::VersionConflict { expected_version: 2, .. }));
        assert_eq!(backend.history("REQ-2").await.unwrap().len(), 1);

        // re-entering keeps the first timestamp
        let story = backend
            .apply_transition(&update("REQ-2", 3, StoryStatus::InternalReview), None)
            .await
            .unwrap();
        assert_eq!(story.timestamps.internal_review_at, Some(first_entry));

        let err = backend
            .apply_transition(&update("REQ-404", 1, StoryStatus::InternalReview), None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::StoryNotFound(_)));
    }

    #[tokio::test]
    async fn test_ledgers_reject_update_and_delete() {
        let (manager, _dir) = manager().await;
        let backend = manager.backend();
        insert_draft(&backend, "REQ-3").await;
        ApprovalLedger::append(&backend, &approval("REQ-3")).await.unwrap();

        for sql in [
            "UPDATE story_approvals SET notes = 'edited'",
            "DELETE FROM story_approvals",
            "UPDATE story_versions SET change_summary = 'edited'",
            "DELETE FROM story_versions",
        ] {
            assert!(sqlx::query(sql).execute(manager.pool()).await.is_err(), "{sql}");
        }

        let history = backend.history("REQ-3").await.unwrap();
        assert_eq!(history[0].notes.as_deref(), Some("looks complete"));
    }

    #[tokio::test]
    async fn test_soft_delete_is_guarded() {
        let (manager, _dir) = manager().await;
        let backend = manager.backend();
        insert_draft(&backend, "REQ-4").await;

        let err = backend
            .soft_delete("REQ-4", 7, "admin", Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::VersionConflict { .. }));

        let deleted = backend
            .soft_delete("REQ-4", 1, "admin", Utc::now())
            .await
            .unwrap();
        assert_eq!(deleted.deleted_by.as_deref(), Some("admin"));

        let err = backend
            .apply_transition(&update("REQ-4", 1, StoryStatus::InternalReview), None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::VersionConflict { .. }));
    }

    #[tokio::test]
    async fn test_user_directory_filters() {
        let (manager, _dir) = manager().await;
        let backend = manager.backend();

        let mut inactive = UserRecord::new("old-pm", Role::ProgramManager);
        inactive.active = false;
        for user in [
            UserRecord::new("pm", Role::ProgramManager).with_programs(&["PRG-1", "PRG-2"]),
            UserRecord::new("dev", Role::Developer),
            inactive,
        ] {
            backend.upsert_user(&user).await.unwrap();
        }

        let managers = backend
            .active_users_with_roles(&[Role::ProgramManager, Role::Admin])
            .await
            .unwrap();
        assert_eq!(managers.len(), 1);
        assert_eq!(managers[0].program_ids, vec!["PRG-1", "PRG-2"]);

        let mut dev = backend.find_user("dev").await.unwrap().unwrap();
        dev.preferences.email_enabled = false;
        backend.upsert_user(&dev).await.unwrap();
        let dev = backend.find_user("dev").await.unwrap().unwrap();
        assert!(!dev.preferences.email_enabled);
        assert!(backend.find_user("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_in_app_channel_writes_inbox() {
        let (manager, _dir) = manager().await;
        let channel = manager.in_app_channel();
        let recipient = UserRecord::new("pm", Role::ProgramManager);
        let notification = Notification {
            story_id: "REQ-5".to_string(),
            subject: "REQ-5 moved to Approved".to_string(),
            body: "Story REQ-5 was moved to Approved.".to_string(),
        };

        channel.deliver(&recipient, &notification).await.unwrap();
        assert_eq!(channel.unread("pm").await.unwrap(), vec![notification]);
        assert!(channel.unread("someone-else").await.unwrap().is_empty());
    }
}
