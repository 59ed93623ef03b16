use std::sync::Arc;

use crewgate_storage::*;
use crewgate_store_postgres::PostgresStore;
use crewgate_store_sqlite::SqliteStore;

/// StoreBackend abstracts over SQLite and PostgreSQL implementations
#[derive(Clone)]
pub enum StoreBackend {
    Sqlite(Arc<SqliteStore>),
    Postgres(Arc<PostgresStore>),
}

impl StoreBackend {
    /// Open the backend named by the URL scheme; anything not PostgreSQL is SQLite.
    pub async fn open(db_url: &str) -> Result<Self, StoreError> {
        if db_url.starts_with("postgres:") || db_url.starts_with("postgresql:") {
            Ok(StoreBackend::Postgres(Arc::new(
                PostgresStore::open(db_url).await?,
            )))
        } else {
            Ok(StoreBackend::Sqlite(Arc::new(SqliteStore::open(db_url).await?)))
        }
    }
}

#[async_trait::async_trait]
impl Store for StoreBackend {
    async fn create_user(&self, params: &CreateUserParams) -> Result<User, StoreError> {
        match self {
            StoreBackend::Sqlite(s) => s.create_user(params).await,
            StoreBackend::Postgres(s) => s.create_user(params).await,
        }
    }

    async fn get_user(&self, user_id: &UserId) -> Result<User, StoreError> {
        match self {
            StoreBackend::Sqlite(s) => s.get_user(user_id).await,
            StoreBackend::Postgres(s) => s.get_user(user_id).await,
        }
    }

    async fn create_workspace(
        &self,
        params: &CreateWorkspaceParams,
    ) -> Result<Workspace, StoreError> {
        match self {
            StoreBackend::Sqlite(s) => s.create_workspace(params).await,
            StoreBackend::Postgres(s) => s.create_workspace(params).await,
        }
    }

    async fn get_workspace(&self, workspace_id: &WorkspaceId) -> Result<Workspace, StoreError> {
        match self {
            StoreBackend::Sqlite(s) => s.get_workspace(workspace_id).await,
            StoreBackend::Postgres(s) => s.get_workspace(workspace_id).await,
        }
    }

    async fn create_project(&self, params: &CreateProjectParams) -> Result<Project, StoreError> {
        match self {
            StoreBackend::Sqlite(s) => s.create_project(params).await,
            StoreBackend::Postgres(s) => s.create_project(params).await,
        }
    }

    async fn get_project(&self, project_id: &ProjectId) -> Result<Project, StoreError> {
        match self {
            StoreBackend::Sqlite(s) => s.get_project(project_id).await,
            StoreBackend::Postgres(s) => s.get_project(project_id).await,
        }
    }

    async fn list_projects(&self, workspace_id: &WorkspaceId) -> Result<Vec<Project>, StoreError> {
        match self {
            StoreBackend::Sqlite(s) => s.list_projects(workspace_id).await,
            StoreBackend::Postgres(s) => s.list_projects(workspace_id).await,
        }
    }

    async fn create_invitation(
        &self,
        params: &CreateInvitationParams,
    ) -> Result<Invitation, StoreError> {
        match self {
            StoreBackend::Sqlite(s) => s.create_invitation(params).await,
            StoreBackend::Postgres(s) => s.create_invitation(params).await,
        }
    }

    async fn get_invitation_by_token(&self, token: &str) -> Result<Invitation, StoreError> {
        match self {
            StoreBackend::Sqlite(s) => s.get_invitation_by_token(token).await,
            StoreBackend::Postgres(s) => s.get_invitation_by_token(token).await,
        }
    }

    async fn list_invitations(&self, resource: &ResourceRef) -> Result<Vec<Invitation>, StoreError> {
        match self {
            StoreBackend::Sqlite(s) => s.list_invitations(resource).await,
            StoreBackend::Postgres(s) => s.list_invitations(resource).await,
        }
    }

    async fn begin_redemption(&self) -> Result<Box<dyn RedemptionTxn>, StoreError> {
        match self {
            StoreBackend::Sqlite(s) => s.begin_redemption().await,
            StoreBackend::Postgres(s) => s.begin_redemption().await,
        }
    }

    async fn get_workspace_role(
        &self,
        workspace_id: &WorkspaceId,
        user_id: &UserId,
    ) -> Result<WorkspaceRole, StoreError> {
        match self {
            StoreBackend::Sqlite(s) => s.get_workspace_role(workspace_id, user_id).await,
            StoreBackend::Postgres(s) => s.get_workspace_role(workspace_id, user_id).await,
        }
    }

    async fn get_project_role(
        &self,
        project_id: &ProjectId,
        user_id: &UserId,
    ) -> Result<ProjectRole, StoreError> {
        match self {
            StoreBackend::Sqlite(s) => s.get_project_role(project_id, user_id).await,
            StoreBackend::Postgres(s) => s.get_project_role(project_id, user_id).await,
        }
    }

    async fn list_members(&self, resource: &ResourceRef) -> Result<Vec<Membership>, StoreError> {
        match self {
            StoreBackend::Sqlite(s) => s.list_members(resource).await,
            StoreBackend::Postgres(s) => s.list_members(resource).await,
        }
    }
}
