use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use crewgate_storage::{
    CreateInvitationParams, CreateProjectParams, CreateUserParams, CreateWorkspaceParams, Grant,
    GrantOutcome, Invitation, InvitationId, InvitationStatus, Membership, Project, ProjectId,
    ProjectRole, RedemptionTxn, ResourceRef, Store, StoreError, User, UserId, Workspace,
    WorkspaceId, WorkspaceRole,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Sqlite, SqlitePool};
use uuid::Uuid;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        Self::open("sqlite::memory:").await
    }

    pub async fn open(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(backend)?
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));

        // A single connection serializes writers, which SQLite requires anyway.
        // It is never recycled, so an in-memory database lives as long as the store.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(backend)?;

        MIGRATOR.run(&pool).await.map_err(backend)?;

        tracing::debug!("opened sqlite store at {}", url);
        Ok(Self { pool })
    }
}

fn backend<E: std::fmt::Display>(e: E) -> StoreError {
    StoreError::Backend(e.to_string())
}

/// Map constraint violations onto the uniform error; everything else is a backend failure.
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

fn parse_uuid(s: &str) -> Result<Uuid, StoreError> {
    Uuid::try_parse(s).map_err(backend)
}

fn parse_opt_uuid(s: Option<&str>) -> Result<Option<Uuid>, StoreError> {
    s.map(parse_uuid).transpose()
}

/// (table, resource column, resource id) holding memberships for a resource.
fn member_table(resource: &ResourceRef) -> (&'static str, &'static str, String) {
    match resource {
        ResourceRef::Workspace(id) => ("workspace_members", "workspace_id", id.0.to_string()),
        ResourceRef::Project(id) => ("project_members", "project_id", id.0.to_string()),
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
    id: String,
    token: String,
    kind: String,
    workspace_id: Option<String>,
    project_id: Option<String>,
    role: String,
    status: String,
    expires_at: Option<DateTime<Utc>>,
    usage_limit: i64,
    remaining_uses: i64,
    created_by_user_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<InvitationRow> for Invitation {
    type Error = StoreError;

    fn try_from(row: InvitationRow) -> Result<Self, Self::Error> {
        Ok(Invitation {
            id: InvitationId(parse_uuid(&row.id)?),
            token: row.token,
            grant: Grant::from_columns(
                &row.kind,
                parse_opt_uuid(row.workspace_id.as_deref())?,
                parse_opt_uuid(row.project_id.as_deref())?,
                &row.role,
            )?,
            status: InvitationStatus::from_str(&row.status).map_err(StoreError::Backend)?,
            expires_at: row.expires_at,
            usage_limit: row.usage_limit,
            remaining_uses: row.remaining_uses,
            created_by_user_id: parse_opt_uuid(row.created_by_user_id.as_deref())?.map(UserId),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ProjectRow {
    id: String,
    workspace_id: String,
    name: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<ProjectRow> for Project {
    type Error = StoreError;

    fn try_from(row: ProjectRow) -> Result<Self, Self::Error> {
        Ok(Project {
            id: ProjectId(parse_uuid(&row.id)?),
            workspace_id: WorkspaceId(parse_uuid(&row.workspace_id)?),
            name: row.name,
            created_at: row.created_at,
        })
    }
}

#[async_trait::async_trait]
impl Store for SqliteStore {
    // ───────────────────────────── Users ─────────────────────────────

    async fn create_user(&self, params: &CreateUserParams) -> Result<User, StoreError> {
        let user_id = Uuid::now_v7();
        let created_at = Utc::now();
        sqlx::query("INSERT INTO users(id, email, created_at) VALUES(?, ?, ?)")
            .bind(user_id.to_string())
            .bind(&params.email)
            .bind(created_at)
            .execute(&self.pool)
            .await
            .map_err(map_write_err)?;

        Ok(User {
            id: UserId(user_id),
            email: params.email.clone(),
            created_at,
        })
    }

    async fn get_user(&self, user_id: &UserId) -> Result<User, StoreError> {
        let row = sqlx::query_as::<_, (String, DateTime<Utc>)>(
            "SELECT email, created_at FROM users WHERE id = ?",
        )
        .bind(user_id.0.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?
        .ok_or(StoreError::NotFound)?;

        Ok(User {
            id: user_id.clone(),
            email: row.0,
            created_at: row.1,
        })
    }

    // ───────────────────────────── Workspaces ─────────────────────────────

    async fn create_workspace(
        &self,
        params: &CreateWorkspaceParams,
    ) -> Result<Workspace, StoreError> {
        let workspace_id = Uuid::now_v7();
        let created_at = Utc::now();
        let mut tx = self.pool.begin().await.map_err(backend)?;

        sqlx::query("INSERT INTO workspaces(id, name, owner_user_id, created_at) VALUES(?, ?, ?, ?)")
            .bind(workspace_id.to_string())
            .bind(&params.name)
            .bind(params.owner_user_id.0.to_string())
            .bind(created_at)
            .execute(&mut *tx)
            .await
            .map_err(map_write_err)?;

        sqlx::query(
            "INSERT INTO workspace_members(workspace_id, user_id, role, created_at) VALUES(?, ?, ?, ?)",
        )
        .bind(workspace_id.to_string())
        .bind(params.owner_user_id.0.to_string())
        .bind(WorkspaceRole::Owner.as_str())
        .bind(created_at)
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
        let row = sqlx::query_as::<_, (String, String, DateTime<Utc>)>(
            "SELECT name, owner_user_id, created_at FROM workspaces WHERE id = ?",
        )
        .bind(workspace_id.0.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?
        .ok_or(StoreError::NotFound)?;

        Ok(Workspace {
            id: workspace_id.clone(),
            name: row.0,
            owner_user_id: UserId(parse_uuid(&row.1)?),
            created_at: row.2,
        })
    }

    // ───────────────────────────── Projects ───────────────────────────────

    async fn create_project(&self, params: &CreateProjectParams) -> Result<Project, StoreError> {
        let project_id = Uuid::now_v7();
        let created_at = Utc::now();
        let mut tx = self.pool.begin().await.map_err(backend)?;

        sqlx::query("INSERT INTO projects(id, workspace_id, name, created_at) VALUES(?, ?, ?, ?)")
            .bind(project_id.to_string())
            .bind(params.workspace_id.0.to_string())
            .bind(&params.name)
            .bind(created_at)
            .execute(&mut *tx)
            .await
            .map_err(map_write_err)?;

        sqlx::query(
            "INSERT INTO project_members(project_id, user_id, role, created_at) VALUES(?, ?, ?, ?)",
        )
        .bind(project_id.to_string())
        .bind(params.created_by_user_id.0.to_string())
        .bind(ProjectRole::Lead.as_str())
        .bind(created_at)
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
        sqlx::query_as::<_, ProjectRow>(
            "SELECT id, workspace_id, name, created_at FROM projects WHERE id = ?",
        )
        .bind(project_id.0.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?
        .ok_or(StoreError::NotFound)?
        .try_into()
    }

    async fn list_projects(&self, workspace_id: &WorkspaceId) -> Result<Vec<Project>, StoreError> {
        let rows = sqlx::query_as::<_, ProjectRow>(
            "SELECT id, workspace_id, name, created_at FROM projects WHERE workspace_id = ? ORDER BY name",
        )
        .bind(workspace_id.0.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.into_iter().map(Project::try_from).collect()
    }

    // ───────────────────────────── Invitations ─────────────────────────────

    async fn create_invitation(
        &self,
        params: &CreateInvitationParams,
    ) -> Result<Invitation, StoreError> {
        let invitation_id = Uuid::now_v7();
        let now = Utc::now();
        let (workspace_id, project_id) = params.grant.target_columns();

        sqlx::query(
            "INSERT INTO invitations(id, token, kind, workspace_id, project_id, role, status,
                                     expires_at, usage_limit, remaining_uses, created_by_user_id,
                                     created_at, updated_at)
             VALUES(?, ?, ?, ?, ?, ?, 'active', ?, ?, ?, ?, ?, ?)",
        )
        .bind(invitation_id.to_string())
        .bind(&params.token)
        .bind(params.grant.kind().as_str())
        .bind(workspace_id.map(|id| id.to_string()))
        .bind(project_id.map(|id| id.to_string()))
        .bind(params.grant.role_str())
        .bind(params.expires_at)
        .bind(params.usage_limit)
        .bind(params.usage_limit)
        .bind(params.created_by_user_id.as_ref().map(|id| id.0.to_string()))
        .bind(now)
        .bind(now)
        .execute(&self.pool)
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
            created_at: now,
            updated_at: now,
        })
    }

    async fn get_invitation_by_token(&self, token: &str) -> Result<Invitation, StoreError> {
        let sql = format!("SELECT {INVITATION_COLUMNS} FROM invitations WHERE token = ?");
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
            "SELECT {INVITATION_COLUMNS} FROM invitations WHERE {column} = ? ORDER BY id DESC"
        );
        let rows = sqlx::query_as::<_, InvitationRow>(&sql)
            .bind(resource.id().to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;

        rows.into_iter().map(Invitation::try_from).collect()
    }

    async fn begin_redemption(&self) -> Result<Box<dyn RedemptionTxn>, StoreError> {
        let tx = self.pool.begin().await.map_err(backend)?;
        Ok(Box::new(SqliteRedemptionTxn { tx }))
    }

    // ───────────────────────────── Memberships ─────────────────────────────

    async fn get_workspace_role(
        &self,
        workspace_id: &WorkspaceId,
        user_id: &UserId,
    ) -> Result<WorkspaceRole, StoreError> {
        let (role,) = sqlx::query_as::<_, (String,)>(
            "SELECT role FROM workspace_members WHERE workspace_id = ? AND user_id = ?",
        )
        .bind(workspace_id.0.to_string())
        .bind(user_id.0.to_string())
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
            "SELECT role FROM project_members WHERE project_id = ? AND user_id = ?",
        )
        .bind(project_id.0.to_string())
        .bind(user_id.0.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?
        .ok_or(StoreError::NotFound)?;

        ProjectRole::from_str(&role).map_err(backend)
    }

    async fn list_members(&self, resource: &ResourceRef) -> Result<Vec<Membership>, StoreError> {
        let (table, column, id) = member_table(resource);
        let sql = format!(
            "SELECT user_id, role, created_at FROM {table} WHERE {column} = ? ORDER BY created_at, user_id"
        );
        let rows = sqlx::query_as::<_, (String, String, DateTime<Utc>)>(&sql)
            .bind(id)
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;

        rows.into_iter()
            .map(|(user_id, role, created_at)| {
                Ok(Membership {
                    user_id: UserId(parse_uuid(&user_id)?),
                    grant: grant_for(resource, &role)?,
                    created_at,
                })
            })
            .collect()
    }
}

// ───────────────────────────── Redemption ─────────────────────────────

/// Redemption unit of work. Rolled back by sqlx when dropped uncommitted.
pub struct SqliteRedemptionTxn {
    tx: sqlx::Transaction<'static, Sqlite>,
}

#[async_trait::async_trait]
impl RedemptionTxn for SqliteRedemptionTxn {
    async fn lock_invitation(&mut self, token: &str) -> Result<Invitation, StoreError> {
        // SQLite has no row locks: a no-op write takes the database write lock
        // before the read, so no other writer can interleave until commit.
        sqlx::query("UPDATE invitations SET updated_at = updated_at WHERE token = ?")
            .bind(token)
            .execute(&mut *self.tx)
            .await
            .map_err(backend)?;

        let sql = format!("SELECT {INVITATION_COLUMNS} FROM invitations WHERE token = ?");
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
        let result = sqlx::query("UPDATE invitations SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(Utc::now())
            .bind(invitation_id.0.to_string())
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
        let row = sqlx::query_as::<_, (i64, String)>(
            "UPDATE invitations
                SET remaining_uses = remaining_uses - 1,
                    status = CASE WHEN remaining_uses - 1 = 0 THEN 'used' ELSE status END,
                    updated_at = ?
              WHERE id = ? AND status = 'active' AND remaining_uses > 0
             RETURNING remaining_uses, status",
        )
        .bind(Utc::now())
        .bind(invitation_id.0.to_string())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(backend)?
        .ok_or(StoreError::Conflict)?;

        let status = InvitationStatus::from_str(&row.1).map_err(StoreError::Backend)?;
        Ok((row.0, status))
    }

    async fn grant_membership(
        &mut self,
        user_id: &UserId,
        grant: &Grant,
    ) -> Result<GrantOutcome, StoreError> {
        let resource = grant.resource();
        let (table, column, id) = member_table(&resource);

        let insert = format!(
            "INSERT INTO {table}({column}, user_id, role, created_at) VALUES(?, ?, ?, ?)
             ON CONFLICT({column}, user_id) DO NOTHING"
        );
        let result = sqlx::query(&insert)
            .bind(&id)
            .bind(user_id.0.to_string())
            .bind(grant.role_str())
            .bind(Utc::now())
            .execute(&mut *self.tx)
            .await
            .map_err(map_write_err)?;

        let select = format!("SELECT role, created_at FROM {table} WHERE {column} = ? AND user_id = ?");
        let (role, created_at) = sqlx::query_as::<_, (String, DateTime<Utc>)>(&select)
            .bind(&id)
            .bind(user_id.0.to_string())
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
