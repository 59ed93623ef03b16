use std::str::FromStr;

use chrono::{DateTime, Utc};
use crewgate_storage::{
    CreateInvitationParams, CreateProjectParams, CreateUserParams, CreateWorkspaceParams, Grant,
    GrantOutcome, Invitation, InvitationId, InvitationStatus, Membership, Project, ProjectId,
    ProjectRole, RedemptionTxn, ResourceRef, Store, StoreError, User, UserId, Workspace,
    WorkspaceId, WorkspaceRole,
};
use sqlx::{postgres::PgPoolOptions, PgPool, Postgres};
use uuid::Uuid;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn open(url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await
            .map_err(backend)?;

        MIGRATOR.run(&pool).await.map_err(backend)?;

        tracing::debug!("opened postgres store");
        Ok(Self { pool })
    }
}

fn backend<E: std::fmt::Display>(e: E) -> StoreError {
    StoreError::Backend(e.to_string())
}

fn map_write_err(e: sqlx::Error) -> StoreError {
    if let Some(db) = e.as_database_error() {
        if db.is_unique_violation() {
            return StoreError::AlreadyExists;
        }
        if db.is_foreign_key_violation() {
            return StoreError::NotFound;
        }
    }
    StoreError::Backend(e.to_string())
}

fn member_table(resource: &ResourceRef) -> (&'static str, &'static str, Uuid) {
    match resource {
        ResourceRef::Workspace(id) => ("workspace_members", "workspace_id", id.0),
        ResourceRef::Project(id) => ("project_members", "project_id", id.0),
    }
}

fn grant_for(resource: &ResourceRef, role: &str) -> Result<Grant, StoreError> {
    Ok(match resource {
        ResourceRef::Workspace(id) => Grant::Workspace {
            workspace_id: id.clone(),
            role: WorkspaceRole::from_str(role).map_err(backend)?,
        },
        ResourceRef::Project(id) => Grant::Project {
            project_id: id.clone(),
            role: ProjectRole::from_str(role).map_err(backend)?,
        },
    })
}

// ───────────────────────────── Rows ─────────────────────────────

const INVITATION_COLUMNS: &str = "id, token, kind, workspace_id, project_id, role, status, \
     expires_at, usage_limit, remaining_uses, created_by_user_id, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct InvitationRow {
    id: Uuid,
    token: String,
    kind: String,
    workspace_id: Option<Uuid>,
    project_id: Option<Uuid>,
    role: String,
    status: String,
    expires_at: Option<DateTime<Utc>>,
    usage_limit: i64,
    remaining_uses: i64,
    created_by_user_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<InvitationRow> for Invitation {
    type Error = StoreError;

    fn try_from(row: InvitationRow) -> Result<Self, Self::Error> {
        Ok(Invitation {
            id: InvitationId(row.id),
            token: row.token,
            grant: Grant::from_columns(&row.kind, row.workspace_id, row.project_id, &row.role)?,
            status: InvitationStatus::from_str(&row.status).map_err(StoreError::Backend)?,
            expires_at: row.expires_at,
            usage_limit: row.usage_limit,
            remaining_uses: row.remaining_uses,
            created_by_user_id: row.created_by_user_id.map(UserId),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ProjectRow {
    id: Uuid,
    workspace_id: Uuid,
    name: String,
    created_at: DateTime<Utc>,
}

impl From<ProjectRow> for Project {
    fn from(row: ProjectRow) -> Self {
        Project {
            id: ProjectId(row.id),
            workspace_id: WorkspaceId(row.workspace_id),
            name: row.name,
            created_at: row.created_at,
        }
    }
}

#[async_trait::async_trait]
impl Store for PostgresStore {
    // ───────────────────────────── Users ─────────────────────────────

    async fn create_user(&self, params: &CreateUserParams) -> Result<User, StoreError> {
        let user_id = Uuid::now_v7();
        let (created_at,) = sqlx::query_as::<_, (DateTime<Utc>,)>(
            "INSERT INTO users(id, email) VALUES($1, $2) RETURNING created_at",
        )
        .bind(user_id)
        .bind(&params.email)
        .fetch_one(&self.pool)
        .await
        .map_err(map_write_err)?;

        Ok(User {
            id: UserId(user_id),
            email: params.email.clone(),
            created_at,
        })
    }

    async fn get_user(&self, user_id: &UserId) -> Result<User, StoreError> {
        let (email, created_at) = sqlx::query_as::<_, (String, DateTime<Utc>)>(
            "SELECT email, created_at FROM users WHERE id = $1",
        )
        .bind(user_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?
        .ok_or(StoreError::NotFound)?;

        Ok(User {
            id: user_id.clone(),
            email,
            created_at,
        })
    }

    // ───────────────────────────── Workspaces ─────────────────────────────

    async fn create_workspace(
        &self,
        params: &CreateWorkspaceParams,
    ) -> Result<Workspace, StoreError> {
        let workspace_id = Uuid::now_v7();
        let mut tx = self.pool.begin().await.map_err(backend)?;

        let (created_at,) = sqlx::query_as::<_, (DateTime<Utc>,)>(
            "INSERT INTO workspaces(id, name, owner_user_id) VALUES($1, $2, $3) RETURNING created_at",
        )
        .bind(workspace_id)
        .bind(&params.name)
        .bind(params.owner_user_id.0)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_write_err)?;

        sqlx::query("INSERT INTO workspace_members(workspace_id, user_id, role) VALUES($1, $2, $3)")
            .bind(workspace_id)
            .bind(params.owner_user_id.0)
            .bind(WorkspaceRole::Owner.as_str())
            .execute(&mut *tx)
            .await
            .map_err(map_write_err)?;

        tx.commit().await.map_err(backend)?;

        Ok(Workspace {
            id: WorkspaceId(workspace_id),
            name: params.name.clone(),
            owner_user_id: params.owner_user_id.clone(),
            created_at,
        })
    }

    async fn get_workspace(&self, workspace_id: &WorkspaceId) -> Result<Workspace, StoreError> {
        let (name, owner_user_id, created_at) = sqlx::query_as::<_, (String, Uuid, DateTime<Utc>)>(
            "SELECT name, owner_user_id, created_at FROM workspaces WHERE id = $1",
        )
        .bind(workspace_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?
        .ok_or(StoreError::NotFound)?;

        Ok(Workspace {
            id: workspace_id.clone(),
            name,
            owner_user_id: UserId(owner_user_id),
            created_at,
        })
    }

    // ───────────────────────────── Projects ───────────────────────────────

    async fn create_project(&self, params: &CreateProjectParams) -> Result<Project, StoreError> {
        let project_id = Uuid::now_v7();
        let mut tx = self.pool.begin().await.map_err(backend)?;

        let (created_at,) = sqlx::query_as::<_, (DateTime<Utc>,)>(
            "INSERT INTO projects(id, workspace_id, name) VALUES($1, $2, $3) RETURNING created_at",
        )
        .bind(project_id)
        .bind(params.workspace_id.0)
        .bind(&params.name)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_write_err)?;

        sqlx::query("INSERT INTO project_members(project_id, user_id, role) VALUES($1, $2, $3)")
            .bind(project_id)
            .bind(params.created_by_user_id.0)
            .bind(ProjectRole::Lead.as_str())
            .execute(&mut *tx)
            .await
            .map_err(map_write_err)?;

        tx.commit().await.map_err(backend)?;

        Ok(Project {
            id: ProjectId(project_id),
            workspace_id: params.workspace_id.clone(),
            name: params.name.clone(),
            created_at,
        })
    }

    async fn get_project(&self, project_id: &ProjectId) -> Result<Project, StoreError> {
        let row = sqlx::query_as::<_, ProjectRow>(
            "SELECT id, workspace_id, name, created_at FROM projects WHERE id = $1",
        )
        .bind(project_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?
        .ok_or(StoreError::NotFound)?;

        Ok(row.into())
    }

    async fn list_projects(&self, workspace_id: &WorkspaceId) -> Result<Vec<Project>, StoreError> {
        let rows = sqlx::query_as::<_, ProjectRow>(
            "SELECT id, workspace_id, name, created_at FROM projects WHERE workspace_id = $1 ORDER BY name",
        )
        .bind(workspace_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        Ok(rows.into_iter().map(Project::from).collect())
    }

    // ───────────────────────────── Invitations ─────────────────────────────

    async fn create_invitation(
        &self,
        params: &CreateInvitationParams,
    ) -> Result<Invitation, StoreError> {
        let invitation_id = Uuid::now_v7();
        let (workspace_id, project_id) = params.grant.target_columns();

        let (created_at, updated_at) = sqlx::query_as::<_, (DateTime<Utc>, DateTime<Utc>)>(
            "INSERT INTO invitations(id, token, kind, workspace_id, project_id, role, status,
                                     expires_at, usage_limit, remaining_uses, created_by_user_id)
             VALUES($1, $2, $3, $4, $5, $6, 'active', $7, $8, $8, $9)
             RETURNING created_at, updated_at",
        )
        .bind(invitation_id)
        .bind(&params.token)
        .bind(params.grant.kind().as_str())
        .bind(workspace_id)
        .bind(project_id)
        .bind(params.grant.role_str())
        .bind(params.expires_at)
        .bind(params.usage_limit)
        .bind(params.created_by_user_id.as_ref().map(|id| id.0))
        .fetch_one(&self.pool)
        .await
        .map_err(map_write_err)?;

        Ok(Invitation {
            id: InvitationId(invitation_id),
            token: params.token.clone(),
            grant: params.grant.clone(),
            status: InvitationStatus::Active,
            expires_at: params.expires_at,
            usage_limit: params.usage_limit,
            remaining_uses: params.usage_limit,
            created_by_user_id: params.created_by_user_id.clone(),
            created_at,
            updated_at,
        })
    }

    async fn get_invitation_by_token(&self, token: &str) -> Result<Invitation, StoreError> {
        let sql = format!("SELECT {INVITATION_COLUMNS} FROM invitations WHERE token = $1");
        sqlx::query_as::<_, InvitationRow>(&sql)
            .bind(token)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?
            .ok_or(StoreError::NotFound)?
            .try_into()
    }

    async fn list_invitations(
        &self,
        resource: &ResourceRef,
    ) -> Result<Vec<Invitation>, StoreError> {
        let column = match resource {
            ResourceRef::Workspace(_) => "workspace_id",
            ResourceRef::Project(_) => "project_id",
        };
        let sql = format!(
            "SELECT {INVITATION_COLUMNS} FROM invitations WHERE {column} = $1 ORDER BY created_at DESC, id DESC"
        );
        let rows = sqlx::query_as::<_, InvitationRow>(&sql)
            .bind(*resource.id())
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;

        rows.into_iter().map(Invitation::try_from).collect()
    }

    async fn begin_redemption(&self) -> Result<Box<dyn RedemptionTxn>, StoreError> {
        let tx = self.pool.begin().await.map_err(backend)?;
        Ok(Box::new(PostgresRedemptionTxn { tx }))
    }

    // ───────────────────────────── Memberships ─────────────────────────────

    async fn get_workspace_role(
        &self,
        workspace_id: &WorkspaceId,
        user_id: &UserId,
    ) -> Result<WorkspaceRole, StoreError> {
        let (role,) = sqlx::query_as::<_, (String,)>(
            "SELECT role FROM workspace_members WHERE workspace_id = $1 AND user_id = $2",
        )
        .bind(workspace_id.0)
        .bind(user_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?
        .ok_or(StoreError::NotFound)?;

        WorkspaceRole::from_str(&role).map_err(backend)
    }

    async fn get_project_role(
        &self,
        project_id: &ProjectId,
        user_id: &UserId,
    ) -> Result<ProjectRole, StoreError> {
        let (role,) = sqlx::query_as::<_, (String,)>(
            "SELECT role FROM project_members WHERE project_id = $1 AND user_id = $2",
        )
        .bind(project_id.0)
        .bind(user_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?
        .ok_or(StoreError::NotFound)?;

        ProjectRole::from_str(&role).map_err(backend)
    }

    async fn list_members(&self, resource: &ResourceRef) -> Result<Vec<Membership>, StoreError> {
        let (table, column, id) = member_table(resource);
        let sql = format!(
            "SELECT user_id, role, created_at FROM {table} WHERE {column} = $1 ORDER BY created_at, user_id"
        );
        let rows = sqlx::query_as::<_, (Uuid, String, DateTime<Utc>)>(&sql)
            .bind(id)
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;

        rows.into_iter()
            .map(|(user_id, role, created_at)| {
                Ok(Membership {
                    user_id: UserId(user_id),
                    grant: grant_for(resource, &role)?,
                    created_at,
                })
            })
            .collect()
    }
}

// ───────────────────────────── Redemption ─────────────────────────────

/// Redemption unit of work. Rolled back by sqlx when dropped uncommitted.
pub struct PostgresRedemptionTxn {
    tx: sqlx::Transaction<'static, Postgres>,
}

#[async_trait::async_trait]
impl RedemptionTxn for PostgresRedemptionTxn {
    async fn lock_invitation(&mut self, token: &str) -> Result<Invitation, StoreError> {
        let sql =
            format!("SELECT {INVITATION_COLUMNS} FROM invitations WHERE token = $1 FOR UPDATE");
        sqlx::query_as::<_, InvitationRow>(&sql)
            .bind(token)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(backend)?
            .ok_or(StoreError::NotFound)?
            .try_into()
    }

    async fn set_invitation_status(
        &mut self,
        invitation_id: &InvitationId,
        status: InvitationStatus,
    ) -> Result<(), StoreError> {
        let result =
            sqlx::query("UPDATE invitations SET status = $1, updated_at = NOW() WHERE id = $2")
                .bind(status.as_str())
                .bind(invitation_id.0)
                .execute(&mut *self.tx)
                .await
                .map_err(backend)?;

        if result.rows_affected() == 0 {
            Err(StoreError::NotFound)
        } else {
            Ok(())
        }
    }

    async fn consume_invitation_use(
        &mut self,
        invitation_id: &InvitationId,
    ) -> Result<(i64, InvitationStatus), StoreError> {
        let (remaining_uses, status) = sqlx::query_as::<_, (i64, String)>(
            "UPDATE invitations
                SET remaining_uses = remaining_uses - 1,
                    status = CASE WHEN remaining_uses - 1 = 0 THEN 'used' ELSE status END,
                    updated_at = NOW()
              WHERE id = $1 AND status = 'active' AND remaining_uses > 0
             RETURNING remaining_uses, status",
        )
        .bind(invitation_id.0)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(backend)?
        .ok_or(StoreError::Conflict)?;

        let status = InvitationStatus::from_str(&status).map_err(StoreError::Backend)?;
        Ok((remaining_uses, status))
    }

    async fn grant_membership(
        &mut self,
        user_id: &UserId,
        grant: &Grant,
    ) -> Result<GrantOutcome, StoreError> {
        let resource = grant.resource();
        let (table, column, id) = member_table(&resource);

        let insert = format!(
            "INSERT INTO {table}({column}, user_id, role) VALUES($1, $2, $3)
             ON CONFLICT({column}, user_id) DO NOTHING"
        );
        let result = sqlx::query(&insert)
            .bind(id)
            .bind(user_id.0)
            .bind(grant.role_str())
            .execute(&mut *self.tx)
            .await
            .map_err(map_write_err)?;

        let select =
            format!("SELECT role, created_at FROM {table} WHERE {column} = $1 AND user_id = $2");
        let (role, created_at) = sqlx::query_as::<_, (String, DateTime<Utc>)>(&select)
            .bind(id)
            .bind(user_id.0)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(backend)?;

        Ok(GrantOutcome {
            membership: Membership {
                user_id: user_id.clone(),
                grant: grant_for(&resource, &role)?,
                created_at,
            },
            created: result.rows_affected() == 1,
        })
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await.map_err(backend)
    }
}
