// Snapshot construction and field diffing for the version trail

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::store::{Story, StoreError, VersionRecord};

/// Top-level fields whose values differ between two snapshots, sorted
pub fn diff_snapshots(before: &Value, after: &Value) -> Vec<String> {
    let (Some(before), Some(after)) = (before.as_object(), after.as_object()) else {
        return if before == after {
            Vec::new()
        } else {
            vec!["*".to_string()]
        };
    };

    let mut changed: Vec<String> = after
        .iter()
        .filter(|(key, value)| before.get(*key) != Some(*value))
        .map(|(key, _)| key.clone())
        .chain(
            before
                .keys()
                .filter(|key| !after.contains_key(*key))
                .cloned(),
        )
        .collect();
    changed.sort();
    changed.dedup();
    changed
}

pub fn summarize_transition(before: &Story, after: &Story) -> String {
    if before.status == after.status {
        format!("Updated to version {}", after.version)
    } else {
        format!("Status changed from {} to {}", before.status, after.status)
    }
}

/// Builds the [`VersionRecord`] for a story row
pub struct VersionRecordBuilder<'a> {
    story: &'a Story,
    changed_by: &'a str,
    changed_at: DateTime<Utc>,
}

impl<'a> VersionRecordBuilder<'a> {
    pub fn new(story: &'a Story, changed_by: &'a str) -> Self {
        Self {
            story,
            changed_by,
            changed_at: story.updated_at,
        }
    }

    /// Snapshot written when a story is first inserted
    pub fn initial(self) -> Result<VersionRecord, StoreError> {
        let summary = format!("Story created in {}", self.story.status);
        self.build(summary, Vec::new())
    }

    /// Snapshot of `self.story` as the result of a change from `previous`
    pub fn after(self, previous: &Story) -> Result<VersionRecord, StoreError> {
        let before = serde_json::to_value(previous)?;
        let after = serde_json::to_value(self.story)?;
        let changed_fields = diff_snapshots(&before, &after);
        let summary = summarize_transition(previous, self.story);
        self.build(summary, changed_fields)
    }

    fn build(
        self,
        change_summary: String,
        changed_fields: Vec<String>,
    ) -> Result<VersionRecord, StoreError> {
        Ok(VersionRecord {
            id: Uuid::new_v4(),
            story_id: self.story.story_id.clone(),
            version_number: self.story.version,
            snapshot: serde_json::to_value(self.story)?,
            change_summary,
            changed_fields,
            changed_by: self.changed_by.to_string(),
            changed_at: self.changed_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{StatusTimestamps, StatusUpdate};
    use crate::workflow::StoryStatus;
    use serde_json::json;

    fn story() -> Story {
        let now = Utc::now();
        Story {
            story_id: "REQ-7".to_string(),
            title: "Retention policy".to_string(),
            program_id: "PRG-1".to_string(),
            status: StoryStatus::Draft,
            version: 1,
            timestamps: StatusTimestamps::default(),
            created_by: "alice".to_string(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
            deleted_by: None,
        }
    }

    #[test]
    fn test_diff_reports_changed_added_and_removed_keys() {
        let before = json!({"a": 1, "b": 2, "c": 3});
        let after = json!({"a": 1, "b": 5, "d": 4});
        assert_eq!(diff_snapshots(&before, &after), vec!["b", "c", "d"]);
        assert!(diff_snapshots(&before, &before).is_empty());
    }

    #[test]
    fn test_transition_snapshot_tracks_new_version() {
        let before = story();
        let mut after = before.clone();
        after.apply(&StatusUpdate {
            story_id: before.story_id.clone(),
            expected_version: 1,
            status: StoryStatus::InternalReview,
            changed_at: Utc::now(),
        });

        let record = VersionRecordBuilder::new(&after, "bob")
            .after(&before)
            .unwrap();
        assert_eq!(record.version_number, 2);
        assert_eq!(record.changed_by, "bob");
        assert_eq!(
            record.change_summary,
            "Status changed from Draft to Internal Review"
        );
        assert!(record.changed_fields.contains(&"status".to_string()));
        assert!(record.changed_fields.contains(&"version".to_string()));
        assert!(record.changed_fields.contains(&"timestamps".to_string()));
        assert!(!record.changed_fields.contains(&"title".to_string()));
        assert_eq!(record.snapshot["status"], json!("internal_review"));
    }

    #[test]
    fn test_initial_snapshot() {
        let record = VersionRecordBuilder::new(&story(), "alice").initial().unwrap();
        assert_eq!(record.version_number, 1);
        assert_eq!(record.change_summary, "Story created in Draft");
        assert!(record.changed_fields.is_empty());
    }
}
