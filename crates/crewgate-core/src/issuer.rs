//! Invitation issuer.
//!
//! Issuing is a single insert: the target is checked for existence first, then
//! one invitation row is written with `remaining_uses = usage_limit`. No other
//! state is touched, so a failure never leaves anything behind.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use crewgate_storage::{
    CreateInvitationParams, Grant, Invitation, ProjectId, ProjectRole, ResourceKind, ResourceRef,
    StoreError, UserId, WorkspaceId, WorkspaceRole,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::token::{generate_token, join_link};
use crate::{AccessControl, AccessError};

/// Untyped issue request as it arrives from a transport.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueRequest {
    pub kind: String,
    pub target_id: String,
    pub role: String,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub usage_limit: Option<i64>,
}

impl IssueRequest {
    /// Validate the kind, target id and role, in that order.
    pub fn into_invitation(self, issued_by: Option<UserId>) -> Result<IssueInvitation, AccessError> {
        let kind = ResourceKind::from_str(&self.kind)
            .map_err(|_| AccessError::InvalidKind(self.kind.clone()))?;
        let target = Uuid::parse_str(&self.target_id)
            .map_err(|_| AccessError::InvalidTargetId(self.target_id.clone()))?;

        let grant = match kind {
            ResourceKind::Workspace => Grant::Workspace {
                workspace_id: WorkspaceId(target),
                role: WorkspaceRole::from_str(&self.role).map_err(|_| {
                    AccessError::InvalidRole(format!("{} is not a workspace role", self.role))
                })?,
            },
            ResourceKind::Project => Grant::Project {
                project_id: ProjectId(target),
                role: ProjectRole::from_str(&self.role).map_err(|_| {
                    AccessError::InvalidRole(format!("{} is not a project role", self.role))
                })?,
            },
        };

        Ok(IssueInvitation {
            grant,
            expires_at: self.expires_at,
            usage_limit: self.usage_limit,
            issued_by,
        })
    }
}

/// Typed issue request.
#[derive(Clone, Debug)]
pub struct IssueInvitation {
    pub grant: Grant,
    /// `None` never expires.
    pub expires_at: Option<DateTime<Utc>>,
    /// Absent or non-positive means a single use.
    pub usage_limit: Option<i64>,
    /// When set, the issuer must lead the target.
    pub issued_by: Option<UserId>,
}

/// What the caller gets back: a shareable link and the expiry.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedInvitation {
    pub join_link: String,
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub invitation: Invitation,
}

pub fn effective_usage_limit(requested: Option<i64>) -> i64 {
    match requested {
        Some(limit) if limit > 0 => limit,
        _ => 1,
    }
}

impl AccessControl {
    pub async fn issue_invitation(
        &self,
        request: IssueInvitation,
    ) -> Result<IssuedInvitation, AccessError> {
        self.ensure_target_exists(&request.grant).await?;

        if let Some(issuer) = &request.issued_by {
            if !self.can_lead(issuer, &request.grant.resource()).await {
                return Err(AccessError::Forbidden);
            }
        }

        let invitation = self
            .store
            .create_invitation(&CreateInvitationParams {
                token: generate_token(),
                grant: request.grant,
                expires_at: request.expires_at,
                usage_limit: effective_usage_limit(request.usage_limit),
                created_by_user_id: request.issued_by,
            })
            .await?;

        info!(
            "issued {} invitation {} on {} (role={}, usage_limit={}, expires_at={:?})",
            invitation.grant.kind().as_str(),
            invitation.id.0,
            invitation.grant.resource().id(),
            invitation.grant.role_str(),
            invitation.usage_limit,
            invitation.expires_at
        );

        Ok(IssuedInvitation {
            join_link: join_link(&self.config.join_base_url, &invitation.token),
            expires_at: invitation.expires_at,
            invitation,
        })
    }

    /// Invitations on `resource`, newest first. Only leaders may list them.
    pub async fn list_invitations(
        &self,
        resource: &ResourceRef,
        requested_by: &UserId,
    ) -> Result<Vec<Invitation>, AccessError> {
        if !self.can_lead(requested_by, resource).await {
            return Err(AccessError::Forbidden);
        }
        Ok(self.store.list_invitations(resource).await?)
    }

    async fn ensure_target_exists(&self, grant: &Grant) -> Result<(), AccessError> {
        let found = match grant {
            Grant::Workspace { workspace_id, .. } => {
                self.store.get_workspace(workspace_id).await.map(|_| ())
            }
            Grant::Project { project_id, .. } => {
                self.store.get_project(project_id).await.map(|_| ())
            }
        };
        match found {
            Ok(()) => Ok(()),
            Err(StoreError::NotFound) => Err(AccessError::TargetNotFound {
                kind: grant.kind().as_str(),
                id: grant.resource().id().to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }
}
