use anyhow::Result;

use super::App;

pub struct ApprovalsCommand {
    pub story_id: String,
}

impl ApprovalsCommand {
    pub async fn execute(&self, app: &App) -> Result<()> {
        let records = app.executor.approval_history(&self.story_id).await?;
        if records.is_empty() {
            println!("No approvals recorded for {}", self.story_id);
            return Ok(());
        }

        println!("📋 Approval ledger for {}:", self.story_id);
        for record in records {
            println!(
                "  {} {} {} {} (from {})",
                record.approved_at.format("%Y-%m-%d %H:%M:%S"),
                record.approved_by,
                record.approval_type,
                record.status,
                record.previous_status
            );
            if let Some(notes) = record.notes {
                println!("      notes: {notes}");
            }
        }
        Ok(())
    }
}

pub struct HistoryCommand {
    pub story_id: String,
}

impl HistoryCommand {
    pub async fn execute(&self, app: &App) -> Result<()> {
        let versions = app.executor.version_history(&self.story_id).await?;
        println!("📜 Version history for {}:", self.story_id);
        for version in versions {
            let fields = if version.changed_fields.is_empty() {
                String::new()
            } else {
                format!(" [{}]", version.changed_fields.join(", "))
            };
            println!(
                "  v{} {} {} {}{}",
                version.version_number,
                version.changed_at.format("%Y-%m-%d %H:%M:%S"),
                version.changed_by,
                version.change_summary,
                fields
            );
        }
        Ok(())
    }
}
