//! Workspace types.

use chrono::{DateTime, Utc};

use super::{UserId, WorkspaceId};

/// Workspace record
#[derive(Clone, Debug)]
pub struct Workspace {
    pub id: WorkspaceId,
    pub name: String,
    pub owner_user_id: UserId,
    pub created_at: DateTime<Utc>,
}

/// Parameters for creating a workspace.
///
/// The owner is granted the owner role in the same transaction.
#[derive(Clone, Debug)]
pub struct CreateWorkspaceParams {
    pub name: String,
    pub owner_user_id: UserId,
}
