//! The Store trait that backends implement.

use crate::types::*;
use crate::StoreError;

/// The storage trait `crewgate-core` depends on.
///
/// Every method is atomic on its own. The one multi-step flow that must be
/// serialized, invitation redemption, goes through [`RedemptionTxn`].
#[cfg_attr(feature = "test-support", mockall::automock)]
#[async_trait::async_trait]
pub trait Store: Send + Sync {
    // ───────────────────────────────────── Users ──────────────────────────────────────────

    /// Create a new user.
    async fn create_user(&self, params: &CreateUserParams) -> Result<User, StoreError>;

    /// Get user by ID.
    async fn get_user(&self, user_id: &UserId) -> Result<User, StoreError>;

    // ───────────────────────────────────── Workspaces ─────────────────────────────────────

    /// Create a workspace and grant its owner the owner role, atomically.
    async fn create_workspace(
        &self,
        params: &CreateWorkspaceParams,
    ) -> Result<Workspace, StoreError>;

    /// Get workspace by ID.
    async fn get_workspace(&self, workspace_id: &WorkspaceId) -> Result<Workspace, StoreError>;

    // ───────────────────────────────────── Projects ───────────────────────────────────────

    /// Create a project and grant its creator the lead role, atomically.
    async fn create_project(&self, params: &CreateProjectParams) -> Result<Project, StoreError>;

    /// Get a project by ID.
    async fn get_project(&self, project_id: &ProjectId) -> Result<Project, StoreError>;

    /// List all projects in a workspace.
    async fn list_projects(&self, workspace_id: &WorkspaceId) -> Result<Vec<Project>, StoreError>;

    // ───────────────────────────────────── Invitations ────────────────────────────────────

    /// Insert a new active invitation with `remaining_uses = usage_limit`.
    /// Fails with `AlreadyExists` if the token collides.
    async fn create_invitation(
        &self,
        params: &CreateInvitationParams,
    ) -> Result<Invitation, StoreError>;

    /// Get invitation by token (any status).
    async fn get_invitation_by_token(&self, token: &str) -> Result<Invitation, StoreError>;

    /// List every invitation ever issued for a resource, newest first.
    async fn list_invitations(&self, resource: &ResourceRef)
        -> Result<Vec<Invitation>, StoreError>;

    /// Open a redemption transaction.
    async fn begin_redemption(&self) -> Result<Box<dyn RedemptionTxn>, StoreError>;

    // ───────────────────────────────────── Memberships ────────────────────────────────────

    /// Role a user holds directly on a workspace (`NotFound` if none).
    async fn get_workspace_role(
        &self,
        workspace_id: &WorkspaceId,
        user_id: &UserId,
    ) -> Result<WorkspaceRole, StoreError>;

    /// Role a user holds directly on a project (`NotFound` if none).
    async fn get_project_role(
        &self,
        project_id: &ProjectId,
        user_id: &UserId,
    ) -> Result<ProjectRole, StoreError>;

    /// List all memberships on a resource.
    async fn list_members(&self, resource: &ResourceRef) -> Result<Vec<Membership>, StoreError>;
}

/// A unit of work for redeeming one invitation.
///
/// `lock_invitation` takes an exclusive lock on the invitation row that is held
/// until `commit`. Dropping the transaction without committing rolls back every
/// write made through it.
#[async_trait::async_trait]
pub trait RedemptionTxn: Send {
    /// Load the invitation by token and lock its row (`NotFound` if absent).
    async fn lock_invitation(&mut self, token: &str) -> Result<Invitation, StoreError>;

    /// Move the invitation to a new status.
    async fn set_invitation_status(
        &mut self,
        invitation_id: &InvitationId,
        status: InvitationStatus,
    ) -> Result<(), StoreError>;

    /// Decrement `remaining_uses` if the invitation is active and has uses left,
    /// flipping it to `Used` when the count reaches zero. Returns the updated
    /// `(remaining_uses, status)`; `Conflict` if nothing was left to consume.
    async fn consume_invitation_use(
        &mut self,
        invitation_id: &InvitationId,
    ) -> Result<(i64, InvitationStatus), StoreError>;

    /// Insert the membership unless one already exists for the (user, resource) pair.
    async fn grant_membership(
        &mut self,
        user_id: &UserId,
        grant: &Grant,
    ) -> Result<GrantOutcome, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}
