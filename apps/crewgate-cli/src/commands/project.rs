use crewgate_core::{AccessControl, AccessError};
use crewgate_storage::{CreateProjectParams, StoreError, WorkspaceRole};
use tracing::info;

use super::{parse_workspace_id, require_principal, CliError};
use crate::output::ProjectView;

/// Only workspace leaders may create projects; the creator becomes the project lead.
pub async fn cmd_project_create(
    access: &AccessControl,
    principal: Option<&str>,
    workspace_id: &str,
    name: &str,
) -> Result<ProjectView, CliError> {
    let creator = require_principal(principal)?;
    let workspace_id = parse_workspace_id(workspace_id)?;

    match access.store().get_workspace(&workspace_id).await {
        Ok(_) => {}
        Err(StoreError::NotFound) => {
            return Err(AccessError::TargetNotFound {
                kind: "workspace",
                id: workspace_id.0.to_string(),
            }
            .into())
        }
        Err(e) => return Err(AccessError::from(e).into()),
    }
    if !access
        .has_workspace_role(&creator, &workspace_id, WorkspaceRole::Leader)
        .await
    {
        return Err(AccessError::Forbidden.into());
    }

    let project = access
        .store()
        .create_project(&CreateProjectParams {
            workspace_id,
            name: name.to_string(),
            created_by_user_id: creator,
        })
        .await
        .map_err(CliError::store("failed to create project"))?;
    info!("created project {} ({})", project.name, project.id.0);
    Ok(project.into())
}

pub async fn cmd_project_list(
    access: &AccessControl,
    principal: Option<&str>,
    workspace_id: &str,
) -> Result<Vec<ProjectView>, CliError> {
    let viewer = require_principal(principal)?;
    let workspace_id = parse_workspace_id(workspace_id)?;
    if !access
        .has_workspace_role(&viewer, &workspace_id, WorkspaceRole::Member)
        .await
    {
        return Err(AccessError::Forbidden.into());
    }
    let projects = access
        .store()
        .list_projects(&workspace_id)
        .await
        .map_err(CliError::store("failed to list projects"))?;
    Ok(projects.into_iter().map(Into::into).collect())
}
