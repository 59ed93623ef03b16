//! Grants: a role on exactly one workspace or exactly one project.
//!
//! Invitations carry the grant they hand out and memberships record the grant
//! a user holds, so both share this tagged variant.

use std::str::FromStr;

use uuid::Uuid;

use super::{ProjectId, ProjectRole, WorkspaceId, WorkspaceRole};
use crate::StoreError;

/// Which resource hierarchy a grant or resource reference belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Workspace,
    Project,
}

/// Error type for parsing ResourceKind from string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseResourceKindError(pub String);

impl std::fmt::Display for ParseResourceKindError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid resource kind: {}", self.0)
    }
}

impl std::error::Error for ParseResourceKindError {}

impl FromStr for ResourceKind {
    type Err = ParseResourceKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "workspace" => Ok(ResourceKind::Workspace),
            "project" => Ok(ResourceKind::Project),
            _ => Err(ParseResourceKindError(s.to_string())),
        }
    }
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Workspace => "workspace",
            ResourceKind::Project => "project",
        }
    }
}

/// Reference to a workspace or a project.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ResourceRef {
    Workspace(WorkspaceId),
    Project(ProjectId),
}

impl ResourceRef {
    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceRef::Workspace(_) => ResourceKind::Workspace,
            ResourceRef::Project(_) => ResourceKind::Project,
        }
    }

    pub fn id(&self) -> &Uuid {
        match self {
            ResourceRef::Workspace(id) => &id.0,
            ResourceRef::Project(id) => &id.0,
        }
    }

    /// Build a reference from a kind and a raw identifier.
    pub fn new(kind: ResourceKind, id: Uuid) -> Self {
        match kind {
            ResourceKind::Workspace => ResourceRef::Workspace(WorkspaceId(id)),
            ResourceKind::Project => ResourceRef::Project(ProjectId(id)),
        }
    }
}

/// A role on a single resource, with the role type fixed by the resource kind.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Grant {
    Workspace {
        workspace_id: WorkspaceId,
        role: WorkspaceRole,
    },
    Project {
        project_id: ProjectId,
        role: ProjectRole,
    },
}

impl Grant {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Grant::Workspace { .. } => ResourceKind::Workspace,
            Grant::Project { .. } => ResourceKind::Project,
        }
    }

    pub fn resource(&self) -> ResourceRef {
        match self {
            Grant::Workspace { workspace_id, .. } => ResourceRef::Workspace(workspace_id.clone()),
            Grant::Project { project_id, .. } => ResourceRef::Project(project_id.clone()),
        }
    }

    pub fn role_str(&self) -> &'static str {
        match self {
            Grant::Workspace { role, .. } => role.as_str(),
            Grant::Project { role, .. } => role.as_str(),
        }
    }

    /// Rebuild a grant from its persisted columns.
    ///
    /// Backends store the discriminator, both nullable target columns and the
    /// role name; exactly one target column must be set and it must match the kind.
    pub fn from_columns(
        kind: &str,
        workspace_id: Option<Uuid>,
        project_id: Option<Uuid>,
        role: &str,
    ) -> Result<Self, StoreError> {
        let kind = ResourceKind::from_str(kind).map_err(|e| StoreError::Backend(e.to_string()))?;
        match (kind, workspace_id, project_id) {
            (ResourceKind::Workspace, Some(ws), None) => Ok(Grant::Workspace {
                workspace_id: WorkspaceId(ws),
                role: WorkspaceRole::from_str(role)
                    .map_err(|e| StoreError::Backend(e.to_string()))?,
            }),
            (ResourceKind::Project, None, Some(project)) => Ok(Grant::Project {
                project_id: ProjectId(project),
                role: ProjectRole::from_str(role)
                    .map_err(|e| StoreError::Backend(e.to_string()))?,
            }),
            _ => Err(StoreError::Backend(format!(
                "{} grant row has inconsistent target columns",
                kind.as_str()
            ))),
        }
    }

    /// The (workspace_id, project_id) column pair for persistence.
    pub fn target_columns(&self) -> (Option<Uuid>, Option<Uuid>) {
        match self {
            Grant::Workspace { workspace_id, .. } => (Some(workspace_id.0), None),
            Grant::Project { project_id, .. } => (None, Some(project_id.0)),
        }
    }
}
