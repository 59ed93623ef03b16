use crewgate_storage::StoreError;
use thiserror::Error;

/// Errors surfaced by issuing, redeeming and authorizing.
///
/// Everything except [`AccessError::Store`] is a caller error and must not be
/// retried. Backend failures are retryable by the caller; the core itself never
/// retries.
#[derive(Debug, Error)]
pub enum AccessError {
    #[error("{kind} {id} not found")]
    TargetNotFound { kind: &'static str, id: String },

    #[error("invalid invitation kind: {0}")]
    InvalidKind(String),

    #[error("invalid role: {0}")]
    InvalidRole(String),

    #[error("invalid target id: {0}")]
    InvalidTargetId(String),

    #[error("invalid or unknown invitation token")]
    InvalidToken,

    #[error("principal is not authenticated")]
    Unauthenticated,

    #[error("principal lacks the required role")]
    Forbidden,

    #[error("invitation has expired")]
    InvitationExpired,

    #[error("invitation has no remaining uses")]
    InvitationExhausted,

    #[error("storage failure: {0}")]
    Store(#[from] StoreError),
}

impl AccessError {
    /// Machine-readable reason code.
    pub fn reason(&self) -> &'static str {
        match self {
            AccessError::TargetNotFound { .. } => "target_not_found",
            AccessError::InvalidKind(_) => "invalid_kind",
            AccessError::InvalidRole(_) => "invalid_role",
            AccessError::InvalidTargetId(_) => "invalid_target_id",
            AccessError::InvalidToken => "invalid_token",
            AccessError::Unauthenticated => "unauthenticated",
            AccessError::Forbidden => "forbidden",
            AccessError::InvitationExpired => "invitation_expired",
            AccessError::InvitationExhausted => "invitation_exhausted",
            AccessError::Store(_) => "internal",
        }
    }

    /// HTTP-equivalent status code.
    pub fn status_code(&self) -> u16 {
        match self {
            AccessError::TargetNotFound { .. } => 404,
            AccessError::Unauthenticated => 401,
            AccessError::Forbidden => 403,
            AccessError::Store(_) => 500,
            AccessError::InvalidKind(_)
            | AccessError::InvalidRole(_)
            | AccessError::InvalidTargetId(_)
            | AccessError::InvalidToken
            | AccessError::InvitationExpired
            | AccessError::InvitationExhausted => 400,
        }
    }

    /// Only transient persistence failures are worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AccessError::Store(StoreError::Backend(_)))
    }
}
