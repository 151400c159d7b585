use anyhow::Result;
use story_gate::store::NewStory;
use story_gate::StoryStatus;

use super::App;

pub struct CreateCommand {
    pub story_id: String,
    pub title: String,
    pub program: String,
    pub status: StoryStatus,
}

impl CreateCommand {
    pub async fn execute(&self, app: &App) -> Result<()> {
        let story = app
            .executor
            .create_story(NewStory {
                story_id: self.story_id.clone(),
                title: self.title.clone(),
                program_id: self.program.clone(),
                initial_status: self.status,
            })
            .await?;

        println!(
            "✅ Created {} \"{}\" in {} (version {})",
            story.story_id, story.title, story.status, story.version
        );
        Ok(())
    }
}

pub struct TransitionCommand {
    pub story_id: String,
    pub target: String,
    pub notes: Option<String>,
}

impl TransitionCommand {
    pub async fn execute(&self, app: &App) -> Result<()> {
        let outcome = app
            .executor
            .transition(&self.story_id, &self.target, self.notes.as_deref())
            .await;

        match (outcome.success, outcome.story, outcome.error) {
            (true, Some(story), _) => {
                println!(
                    "✅ {} moved to {} (version {})",
                    story.story_id, story.status, story.version
                );
                Ok(())
            }
            (_, _, error) => Err(anyhow::anyhow!(
                error.unwrap_or_else(|| "transition failed".to_string())
            )),
        }
    }
}

pub struct AllowedCommand {
    pub story_id: String,
}

impl AllowedCommand {
    pub async fn execute(&self, app: &App) -> Result<()> {
        let rules = app.executor.allowed_transitions(&self.story_id).await?;
        if rules.is_empty() {
            println!("No transitions available to you for {}", self.story_id);
            return Ok(());
        }

        println!("Transitions available for {}:", self.story_id);
        for rule in rules {
            let mut extras = Vec::new();
            if let Some(approval) = rule.approval_type {
                extras.push(format!("records {approval} approval"));
            }
            if rule.requires_notes {
                extras.push("notes required".to_string());
            }
            let extras = if extras.is_empty() {
                String::new()
            } else {
                format!(" ({})", extras.join(", "))
            };
            println!("  → {:<22} {}{}", rule.to.as_str(), rule.label, extras);
        }
        Ok(())
    }
}

pub struct DeleteCommand {
    pub story_id: String,
}

impl DeleteCommand {
    pub async fn execute(&self, app: &App) -> Result<()> {
        let story = app.executor.soft_delete(&self.story_id).await?;
        println!(
            "🗑️  {} soft-deleted by {}",
            story.story_id,
            story.deleted_by.as_deref().unwrap_or("unknown")
        );
        Ok(())
    }
}
