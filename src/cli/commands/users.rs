use anyhow::Result;
use story_gate::store::{UserDirectory, UserRecord};
use story_gate::Role;

use super::App;

pub struct AddUserCommand {
    pub user_id: String,
    pub role: Role,
    pub name: Option<String>,
    pub email: Option<String>,
    pub programs: Vec<String>,
    pub inactive: bool,
}

impl AddUserCommand {
    pub async fn execute(&self, app: &App) -> Result<()> {
        let user_id = self.user_id.trim();
        if user_id.is_empty() {
            anyhow::bail!("user id must not be empty");
        }

        let mut user = UserRecord::new(user_id, self.role);
        if let Some(name) = &self.name {
            user.display_name = name.clone();
        }
        if let Some(email) = &self.email {
            user.email = email.clone();
        }
        user.program_ids = self.programs.clone();
        user.active = !self.inactive;

        app.backend.upsert_user(&user).await?;
        println!(
            "👤 {} registered as {}{}",
            user.user_id,
            user.role,
            if user.active { "" } else { " (inactive)" }
        );
        Ok(())
    }
}
