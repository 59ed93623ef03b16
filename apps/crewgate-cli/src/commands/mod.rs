pub mod authorize;
pub mod invite;
pub mod members;
pub mod project;
pub mod user;
pub mod workspace;

pub use authorize::cmd_authorize;
pub use invite::{
    cmd_invite_issue, cmd_invite_list, cmd_invite_redeem, cmd_invite_show, expiry_after_hours,
};
pub use members::cmd_members_list;
pub use project::{cmd_project_create, cmd_project_list};
pub use user::cmd_user_create;
pub use workspace::cmd_workspace_create;

use std::str::FromStr;

use crewgate_core::{AccessConfig, AccessError, ConfigError};
use crewgate_storage::{ResourceKind, ResourceRef, StoreError, UserId, WorkspaceId};
use thiserror::Error;
use uuid::Uuid;

use crate::output::ErrorView;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Access(#[from] AccessError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("expiry of {0} hours from now is out of range")]
    InvalidExpiry(i64),

    #[error("failed to encode output: {0}")]
    Output(#[from] serde_json::Error),

    #[error("{context}: {source}")]
    Store {
        context: &'static str,
        #[source]
        source: StoreError,
    },
}

impl CliError {
    pub fn store(context: &'static str) -> impl FnOnce(StoreError) -> CliError {
        move |source| CliError::Store { context, source }
    }

    pub fn reason(&self) -> &'static str {
        match self {
            CliError::Access(e) => e.reason(),
            CliError::Config(_) => "invalid_config",
            CliError::InvalidExpiry(_) => "invalid_expiry",
            CliError::Output(_) => "internal",
            CliError::Store { source, .. } => match source {
                StoreError::NotFound => "not_found",
                StoreError::AlreadyExists => "already_exists",
                StoreError::Conflict => "conflict",
                StoreError::Backend(_) => "internal",
            },
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            CliError::Access(e) => e.status_code(),
            CliError::Config(_) | CliError::InvalidExpiry(_) => 400,
            CliError::Output(_) => 500,
            CliError::Store { source, .. } => match source {
                StoreError::NotFound => 404,
                StoreError::AlreadyExists | StoreError::Conflict => 409,
                StoreError::Backend(_) => 500,
            },
        }
    }

    pub fn to_view(&self) -> ErrorView {
        ErrorView {
            error: self.reason(),
            status: self.status_code(),
            message: self.to_string(),
        }
    }
}

/// An explicit `--join-url` wins; otherwise the environment decides.
pub fn resolve_config(join_url: Option<String>) -> Result<AccessConfig, CliError> {
    let config = match join_url {
        Some(url) => AccessConfig::with_join_url(url)?,
        None => AccessConfig::from_env()?,
    };
    Ok(config)
}

/// The acting principal, required.
pub fn require_principal(raw: Option<&str>) -> Result<UserId, CliError> {
    parse_principal(raw)?.ok_or(CliError::Access(AccessError::Unauthenticated))
}

/// A principal id that is not a UUID cannot name a user, so it is unauthenticated.
pub fn parse_principal(raw: Option<&str>) -> Result<Option<UserId>, CliError> {
    raw.map(|s| {
        Uuid::parse_str(s)
            .map(UserId)
            .map_err(|_| CliError::Access(AccessError::Unauthenticated))
    })
    .transpose()
}

pub fn parse_resource(kind: &str, id: &str) -> Result<ResourceRef, CliError> {
    let kind =
        ResourceKind::from_str(kind).map_err(|_| AccessError::InvalidKind(kind.to_string()))?;
    let id = Uuid::parse_str(id).map_err(|_| AccessError::InvalidTargetId(id.to_string()))?;
    Ok(ResourceRef::new(kind, id))
}

pub fn parse_workspace_id(id: &str) -> Result<WorkspaceId, CliError> {
    Uuid::parse_str(id)
        .map(WorkspaceId)
        .map_err(|_| CliError::Access(AccessError::InvalidTargetId(id.to_string())))
}
