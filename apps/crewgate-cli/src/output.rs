//! JSON shapes printed by the commands.

use chrono::{DateTime, Utc};
use crewgate_core::Redemption;
use crewgate_storage::{Invitation, Membership, Project, User, Workspace};
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        Self {
            id: user.id.0.to_string(),
            email: user.email,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceView {
    pub id: String,
    pub name: String,
    pub owner_user_id: String,
    pub created_at: DateTime<Utc>,
}

impl From<Workspace> for WorkspaceView {
    fn from(ws: Workspace) -> Self {
        Self {
            id: ws.id.0.to_string(),
            name: ws.name,
            owner_user_id: ws.owner_user_id.0.to_string(),
            created_at: ws.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectView {
    pub id: String,
    pub workspace_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl From<Project> for ProjectView {
    fn from(project: Project) -> Self {
        Self {
            id: project.id.0.to_string(),
            workspace_id: project.workspace_id.0.to_string(),
            name: project.name,
            created_at: project.created_at,
        }
    }
}

/// Invitation without its token.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvitationView {
    pub id: String,
    pub kind: &'static str,
    pub target_id: String,
    pub role: &'static str,
    pub status: &'static str,
    pub expires_at: Option<DateTime<Utc>>,
    pub usage_limit: i64,
    pub remaining_uses: i64,
    pub created_by_user_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Invitation> for InvitationView {
    fn from(inv: Invitation) -> Self {
        Self {
            id: inv.id.0.to_string(),
            kind: inv.grant.kind().as_str(),
            target_id: inv.grant.resource().id().to_string(),
            role: inv.grant.role_str(),
            status: inv.status.as_str(),
            expires_at: inv.expires_at,
            usage_limit: inv.usage_limit,
            remaining_uses: inv.remaining_uses,
            created_by_user_id: inv.created_by_user_id.map(|u| u.0.to_string()),
            created_at: inv.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipView {
    pub user_id: String,
    pub kind: &'static str,
    pub resource_id: String,
    pub role: &'static str,
    pub created_at: DateTime<Utc>,
}

impl From<Membership> for MembershipView {
    fn from(m: Membership) -> Self {
        Self {
            user_id: m.user_id.0.to_string(),
            kind: m.grant.kind().as_str(),
            resource_id: m.grant.resource().id().to_string(),
            role: m.grant.role_str(),
            created_at: m.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedemptionView {
    pub success: bool,
    pub newly_granted: bool,
    pub remaining_uses: i64,
    pub status: &'static str,
    pub membership: MembershipView,
}

impl From<Redemption> for RedemptionView {
    fn from(r: Redemption) -> Self {
        Self {
            success: true,
            newly_granted: r.newly_granted,
            remaining_uses: r.remaining_uses,
            status: r.status.as_str(),
            membership: r.membership.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuthorizeView {
    pub allowed: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorView {
    pub error: &'static str,
    pub status: u16,
    pub message: String,
}
