use crewgate_core::{AccessControl, AccessError};
use crewgate_storage::{CreateWorkspaceParams, StoreError};
use tracing::info;

use super::{require_principal, CliError};
use crate::output::WorkspaceView;

pub async fn cmd_workspace_create(
    access: &AccessControl,
    principal: Option<&str>,
    name: &str,
) -> Result<WorkspaceView, CliError> {
    let owner = require_principal(principal)?;
    let workspace = match access
        .store()
        .create_workspace(&CreateWorkspaceParams {
            name: name.to_string(),
            owner_user_id: owner,
        })
        .await
    {
        Ok(ws) => ws,
        // The owner row references users; a dangling id is an unknown principal
        Err(StoreError::NotFound) => return Err(AccessError::Unauthenticated.into()),
        Err(e) => return Err(CliError::store("failed to create workspace")(e)),
    };
    info!("created workspace {} ({})", workspace.name, workspace.id.0);
    Ok(workspace.into())
}
