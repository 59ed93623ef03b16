//! Authorization resolver: role checks over workspace and project memberships.
//!
//! A project check succeeds through either path:
//! 1. a direct project membership whose role includes the minimum, or
//! 2. an owner/leader membership on the project's parent workspace, which
//!    carries the top project role for every project in that workspace.
//!
//! Checks never error for "not a member" or "no such resource"; both are `false`.
//! Backend read failures are logged and also resolve to `false`.

use std::str::FromStr;

use crewgate_storage::{
    Membership, ProjectId, ProjectRole, ResourceKind, ResourceRef, StoreError, UserId,
    WorkspaceId, WorkspaceRole,
};
use tracing::{debug, warn};

use crate::{AccessControl, AccessError};

/// Minimum role for a check, tied to the hierarchy it belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MinimumRole {
    Workspace(WorkspaceRole),
    Project(ProjectRole),
}

impl MinimumRole {
    /// Parse a role name within the hierarchy of `kind`.
    pub fn parse(kind: ResourceKind, role: &str) -> Result<Self, AccessError> {
        match kind {
            ResourceKind::Workspace => WorkspaceRole::from_str(role)
                .map(MinimumRole::Workspace)
                .map_err(|_| AccessError::InvalidRole(format!("{} is not a workspace role", role))),
            ResourceKind::Project => ProjectRole::from_str(role)
                .map(MinimumRole::Project)
                .map_err(|_| AccessError::InvalidRole(format!("{} is not a project role", role))),
        }
    }
}

/// Collapse a single-row lookup: missing rows are `None`, failures are logged as `None`.
fn found_or_none<R>(result: Result<R, StoreError>, what: &str) -> Option<R> {
    match result {
        Ok(found) => Some(found),
        Err(StoreError::NotFound) => None,
        Err(e) => {
            warn!("authorization lookup of {} failed: {}", what, e);
            None
        }
    }
}

impl AccessControl {
    /// Check `principal` holds at least `minimum` on `resource`.
    ///
    /// The only error is a minimum role from the other hierarchy than the resource.
    pub async fn has_role(
        &self,
        principal: &UserId,
        resource: &ResourceRef,
        minimum: MinimumRole,
    ) -> Result<bool, AccessError> {
        match (resource, minimum) {
            (ResourceRef::Workspace(ws), MinimumRole::Workspace(role)) => {
                Ok(self.has_workspace_role(principal, ws, role).await)
            }
            (ResourceRef::Project(project), MinimumRole::Project(role)) => {
                Ok(self.has_project_role(principal, project, role).await)
            }
            (resource, _) => Err(AccessError::InvalidRole(format!(
                "minimum role does not belong to the {} hierarchy",
                resource.kind().as_str()
            ))),
        }
    }

    pub async fn has_workspace_role(
        &self,
        principal: &UserId,
        workspace_id: &WorkspaceId,
        minimum: WorkspaceRole,
    ) -> bool {
        let held = found_or_none(
            self.store.get_workspace_role(workspace_id, principal).await,
            "workspace membership",
        );
        let allowed = held.is_some_and(|role| role.includes(&minimum));
        debug!(
            "workspace check {:?} on {:?} for {}: held={:?} allowed={}",
            principal.0,
            workspace_id.0,
            minimum.as_str(),
            held.map(|r| r.as_str()),
            allowed
        );
        allowed
    }

    pub async fn has_project_role(
        &self,
        principal: &UserId,
        project_id: &ProjectId,
        minimum: ProjectRole,
    ) -> bool {
        let held = self.effective_project_role(principal, project_id).await;
        let allowed = held.is_some_and(|role| role.includes(&minimum));
        debug!(
            "project check {:?} on {:?} for {}: held={:?} allowed={}",
            principal.0,
            project_id.0,
            minimum.as_str(),
            held.map(|r| r.as_str()),
            allowed
        );
        allowed
    }

    /// Leader or above on `resource`; for projects this includes workspace leadership.
    pub async fn can_lead(&self, principal: &UserId, resource: &ResourceRef) -> bool {
        match resource {
            ResourceRef::Workspace(ws) => {
                self.has_workspace_role(principal, ws, WorkspaceRole::Leader)
                    .await
            }
            ResourceRef::Project(project) => {
                self.has_project_role(principal, project, ProjectRole::Leader)
                    .await
            }
        }
    }

    /// Members of `resource`. Any role on it, direct or inherited, may list them.
    pub async fn list_members(
        &self,
        resource: &ResourceRef,
        requested_by: &UserId,
    ) -> Result<Vec<Membership>, AccessError> {
        let visible = match resource {
            ResourceRef::Workspace(ws) => {
                self.has_workspace_role(requested_by, ws, WorkspaceRole::Member)
                    .await
            }
            ResourceRef::Project(project) => {
                self.has_project_role(requested_by, project, ProjectRole::Viewer)
                    .await
            }
        };
        if !visible {
            return Err(AccessError::Forbidden);
        }
        Ok(self.store.list_members(resource).await?)
    }

    /// Strongest project authority `principal` holds, from either path.
    pub async fn effective_project_role(
        &self,
        principal: &UserId,
        project_id: &ProjectId,
    ) -> Option<ProjectRole> {
        let direct = found_or_none(
            self.store.get_project_role(project_id, principal).await,
            "project membership",
        );
        if direct == Some(ProjectRole::Lead) {
            return direct;
        }

        let Some(project) = found_or_none(self.store.get_project(project_id).await, "project")
        else {
            return direct;
        };
        let inherited = found_or_none(
            self.store
                .get_workspace_role(&project.workspace_id, principal)
                .await,
            "parent workspace membership",
        )
        .filter(|role| role.leads_projects())
        .map(|_| ProjectRole::Lead);

        match (direct, inherited) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AccessConfig;
    use chrono::Utc;
    use crewgate_storage::{MockStore, Project};
    use std::sync::Arc;
    use uuid::Uuid;

    fn access(store: MockStore) -> AccessControl {
        AccessControl::new(Arc::new(store), AccessConfig::default())
    }

    #[test]
    fn test_minimum_role_parse_stays_in_hierarchy() {
        assert_eq!(
            MinimumRole::parse(ResourceKind::Project, "lead").unwrap(),
            MinimumRole::Project(ProjectRole::Lead)
        );
        assert!(matches!(
            MinimumRole::parse(ResourceKind::Project, "owner"),
            Err(AccessError::InvalidRole(_))
        ));
        assert!(matches!(
            MinimumRole::parse(ResourceKind::Workspace, "viewer"),
            Err(AccessError::InvalidRole(_))
        ));
    }

    #[tokio::test]
    async fn test_mismatched_hierarchy_is_an_error() {
        let access = access(MockStore::new());
        let principal = UserId(Uuid::now_v7());
        let err = access
            .has_role(
                &principal,
                &ResourceRef::Project(ProjectId(Uuid::now_v7())),
                MinimumRole::Workspace(WorkspaceRole::Member),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AccessError::InvalidRole(_)));
    }

    #[tokio::test]
    async fn test_backend_failure_denies() {
        let mut store = MockStore::new();
        store
            .expect_get_workspace_role()
            .returning(|_, _| Err(StoreError::Backend("connection reset".to_string())));
        let access = access(store);

        let allowed = access
            .has_role(
                &UserId(Uuid::now_v7()),
                &ResourceRef::Workspace(WorkspaceId(Uuid::now_v7())),
                MinimumRole::Workspace(WorkspaceRole::Member),
            )
            .await
            .unwrap();
        assert!(!allowed);
    }

    #[tokio::test]
    async fn test_direct_lead_skips_workspace_lookup() {
        let mut store = MockStore::new();
        store
            .expect_get_project_role()
            .returning(|_, _| Ok(ProjectRole::Lead));
        store.expect_get_project().never();
        store.expect_get_workspace_role().never();
        let access = access(store);

        let role = access
            .effective_project_role(&UserId(Uuid::now_v7()), &ProjectId(Uuid::now_v7()))
            .await;
        assert_eq!(role, Some(ProjectRole::Lead));
    }

    #[tokio::test]
    async fn test_workspace_leader_inherits_lead() {
        let workspace_id = WorkspaceId(Uuid::now_v7());
        let project_id = ProjectId(Uuid::now_v7());

        let mut store = MockStore::new();
        store
            .expect_get_project_role()
            .returning(|_, _| Ok(ProjectRole::Viewer));
        let ws = workspace_id.clone();
        store.expect_get_project().returning(move |id| {
            Ok(Project {
                id: id.clone(),
                workspace_id: ws.clone(),
                name: "backlog".to_string(),
                created_at: Utc::now(),
            })
        });
        store
            .expect_get_workspace_role()
            .withf(move |ws, _| *ws == workspace_id)
            .returning(|_, _| Ok(WorkspaceRole::Leader));
        let access = access(store);

        let principal = UserId(Uuid::now_v7());
        assert_eq!(
            access.effective_project_role(&principal, &project_id).await,
            Some(ProjectRole::Lead)
        );
        assert!(
            access
                .has_project_role(&principal, &project_id, ProjectRole::Leader)
                .await
        );
    }

    #[tokio::test]
    async fn test_workspace_member_gets_nothing_on_projects() {
        let mut store = MockStore::new();
        store
            .expect_get_project_role()
            .returning(|_, _| Err(StoreError::NotFound));
        store.expect_get_project().returning(|id| {
            Ok(Project {
                id: id.clone(),
                workspace_id: WorkspaceId(Uuid::now_v7()),
                name: "backlog".to_string(),
                created_at: Utc::now(),
            })
        });
        store
            .expect_get_workspace_role()
            .returning(|_, _| Ok(WorkspaceRole::Member));
        let access = access(store);

        let project_id = ProjectId(Uuid::now_v7());
        let principal = UserId(Uuid::now_v7());
        assert_eq!(
            access.effective_project_role(&principal, &project_id).await,
            None
        );
        assert!(
            !access
                .has_project_role(&principal, &project_id, ProjectRole::Viewer)
                .await
        );
    }

    #[tokio::test]
    async fn test_missing_project_is_false() {
        let mut store = MockStore::new();
        store
            .expect_get_project_role()
            .returning(|_, _| Err(StoreError::NotFound));
        store
            .expect_get_project()
            .returning(|_| Err(StoreError::NotFound));
        let access = access(store);

        assert!(
            !access
                .has_project_role(
                    &UserId(Uuid::now_v7()),
                    &ProjectId(Uuid::now_v7()),
                    ProjectRole::Viewer
                )
                .await
        );
    }

    #[tokio::test]
    async fn test_non_member_cannot_list_members() {
        let mut store = MockStore::new();
        store
            .expect_get_workspace_role()
            .returning(|_, _| Err(StoreError::NotFound));
        store.expect_list_members().never();
        let access = access(store);

        let err = access
            .list_members(
                &ResourceRef::Workspace(WorkspaceId(Uuid::now_v7())),
                &UserId(Uuid::now_v7()),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AccessError::Forbidden));
        assert_eq!(err.status_code(), 403);
    }
}
