//! Project types.

use chrono::{DateTime, Utc};

use super::{ProjectId, UserId, WorkspaceId};

/// Project record
#[derive(Clone, Debug)]
pub struct Project {
    pub id: ProjectId,
    pub workspace_id: WorkspaceId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Parameters for creating a project.
///
/// The creator is granted the lead role in the same transaction.
#[derive(Clone, Debug)]
pub struct CreateProjectParams {
    pub workspace_id: WorkspaceId,
    pub name: String,
    pub created_by_user_id: UserId,
}
