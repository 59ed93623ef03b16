mod backend;
mod cli;
mod commands;
mod output;


use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use crewgate_core::AccessControl;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use backend::StoreBackend;
use cli::{
    Cli, Command, InviteCommand, MembersCommand, ProjectCommand, UserCommand, WorkspaceCommand,
};
use commands::*;

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = resolve_config(cli.join_url)?;
    let store = StoreBackend::open(&cli.database_url)
        .await
        .map_err(CliError::store("failed to open database"))?;
    let access = AccessControl::new(Arc::new(store), config);
    let principal = cli.principal.as_deref();

    match cli.command {
        Command::User { user_cmd } => match user_cmd {
            UserCommand::Create { email } => print_json(&cmd_user_create(&access, &email).await?),
        },
        Command::Workspace { workspace_cmd } => match workspace_cmd {
            WorkspaceCommand::Create { name } => {
                print_json(&cmd_workspace_create(&access, principal, &name).await?)
            }
        },
        Command::Project { project_cmd } => match project_cmd {
            ProjectCommand::Create { workspace_id, name } => print_json(
                &cmd_project_create(&access, principal, &workspace_id, &name).await?,
            ),
            ProjectCommand::List { workspace_id } => {
                print_json(&cmd_project_list(&access, principal, &workspace_id).await?)
            }
        },
        Command::Invite { invite_cmd } => match invite_cmd {
            InviteCommand::Issue {
                kind,
                target_id,
                role,
                expires_at,
                expires_hours,
                usage_limit,
            } => print_json(
                &cmd_invite_issue(
                    &access,
                    principal,
                    &kind,
                    &target_id,
                    &role,
                    expires_at,
                    expires_hours,
                    usage_limit,
                )
                .await?,
            ),
            InviteCommand::Show { token } => print_json(&cmd_invite_show(&access, &token).await?),
            InviteCommand::List { kind, target_id } => {
                print_json(&cmd_invite_list(&access, principal, &kind, &target_id).await?)
            }
            InviteCommand::Redeem { token } => {
                print_json(&cmd_invite_redeem(&access, principal, &token).await?)
            }
        },
        Command::Authorize {
            kind,
            resource_id,
            role,
        } => print_json(&cmd_authorize(&access, principal, &kind, &resource_id, &role).await?),
        Command::Members { members_cmd } => match members_cmd {
            MembersCommand::List { kind, target_id } => {
                print_json(&cmd_members_list(&access, principal, &kind, &target_id).await?)
            }
        },
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let view = e.to_view();
            match serde_json::to_string(&view) {
                Ok(json) => eprintln!("{}", json),
                Err(_) => eprintln!("{}", e),
            }
            if view.status >= 500 {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}
