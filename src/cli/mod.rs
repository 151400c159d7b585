use clap::{Parser, Subcommand};
use story_gate::{Role, StoryStatus};

pub mod commands;

#[derive(Parser)]
#[command(name = "story-gate")]
#[command(about = "Regulated story workflow with approval ledger and version history")]
#[command(long_about = "story-gate moves requirement stories through a fixed review lifecycle. \
                       Every transition is checked against the role policy, regulated hand-offs \
                       are written to an append-only approval ledger, and every version is snapshotted.")]
pub struct Cli {
    /// Act as this user
    #[arg(long = "as", global = true, env = "STORY_GATE_USER", help = "User id to act as")]
    pub user: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Register or update a user (operator seeding, no caller check)
    AddUser {
        /// User id
        user_id: String,
        /// Role: admin, portfolio_manager, program_manager, business_analyst, developer, uat_manager, viewer
        #[arg(long)]
        role: Role,
        /// Display name, defaults to the user id
        #[arg(long)]
        name: Option<String>,
        /// Email address, defaults to <user_id>@example.com
        #[arg(long)]
        email: Option<String>,
        /// Assigned program, may be repeated
        #[arg(long = "program")]
        programs: Vec<String>,
        /// Store the user as inactive
        #[arg(long)]
        inactive: bool,
    },
    /// Create a story at version 1
    Create {
        /// Story id, e.g. REQ-0042
        story_id: String,
        #[arg(long)]
        title: String,
        #[arg(long)]
        program: String,
        /// Initial status; anything but draft is admin only
        #[arg(long, default_value = "draft")]
        status: StoryStatus,
    },
    /// Move a story to another status
    Transition {
        story_id: String,
        /// Target status, e.g. internal_review or "In UAT"
        target: String,
        #[arg(long)]
        notes: Option<String>,
    },
    /// List the transitions you may take on a story
    Allowed { story_id: String },
    /// Show the approval ledger of a story
    Approvals { story_id: String },
    /// Show the version history of a story
    History { story_id: String },
    /// Soft-delete a story (admin only)
    Delete { story_id: String },
    /// Print the transition policy table
    Policy {
        /// Only rules this role may take
        #[arg(long)]
        role: Option<Role>,
    },
}
