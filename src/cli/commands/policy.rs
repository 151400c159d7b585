use anyhow::Result;
use story_gate::workflow::policy;
use story_gate::Role;

pub struct PolicyCommand {
    pub role: Option<Role>,
}

impl PolicyCommand {
    pub fn execute(&self) -> Result<()> {
        let rules = policy::all_rules().filter(|rule| self.role.map_or(true, |role| rule.allows(role)));

        for rule in rules {
            let roles: Vec<&str> = rule.allowed_roles.iter().map(Role::as_str).collect();
            let mut line = format!(
                "{} → {}: {} [{}]",
                rule.from,
                rule.to,
                rule.label,
                roles.join(", ")
            );
            if let Some(approval) = rule.approval_type {
                line.push_str(&format!(" approval={approval}"));
            }
            if rule.requires_notes {
                line.push_str(" notes=required");
            }
            println!("{line}");
        }
        Ok(())
    }
}
