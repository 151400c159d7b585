use anyhow::Result;
use clap::Parser;
use story_gate::{config, init_telemetry, OperationTimer};

mod cli;

use cli::commands::audit::{ApprovalsCommand, HistoryCommand};
use cli::commands::policy::PolicyCommand;
use cli::commands::stories::{AllowedCommand, CreateCommand, DeleteCommand, TransitionCommand};
use cli::commands::users::AddUserCommand;
use cli::commands::App;
use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = config()?;
    init_telemetry(&config.observability)?;

    // the policy table needs no database
    if let Commands::Policy { role } = cli.command {
        return PolicyCommand { role }.execute();
    }

    let timer = OperationTimer::new("story-gate command");
    let app = App::open(config, cli.user).await?;
    let result = run(cli.command, &app).await;
    app.close().await;
    timer.finish();

    if let Err(e) = result {
        eprintln!("❌ {e}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run(command: Commands, app: &App) -> Result<()> {
    match command {
        Commands::AddUser {
            user_id,
            role,
            name,
            email,
            programs,
            inactive,
        } => {
            AddUserCommand {
                user_id,
                role,
                name,
                email,
                programs,
                inactive,
            }
            .execute(app)
            .await
        }
        Commands::Create {
            story_id,
            title,
            program,
            status,
        } => {
            CreateCommand {
                story_id,
                title,
                program,
                status,
            }
            .execute(app)
            .await
        }
        Commands::Transition {
            story_id,
            target,
            notes,
        } => {
            TransitionCommand {
                story_id,
                target,
                notes,
            }
            .execute(app)
            .await
        }
        Commands::Allowed { story_id } => AllowedCommand { story_id }.execute(app).await,
        Commands::Approvals { story_id } => ApprovalsCommand { story_id }.execute(app).await,
        Commands::History { story_id } => HistoryCommand { story_id }.execute(app).await,
        Commands::Delete { story_id } => DeleteCommand { story_id }.execute(app).await,
        Commands::Policy { role } => PolicyCommand { role }.execute(),
    }
}
