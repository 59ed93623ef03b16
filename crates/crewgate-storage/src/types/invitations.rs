//! Invitation types.

use std::str::FromStr;

use chrono::{DateTime, Utc};

use super::{Grant, InvitationId, UserId};

/// Lifecycle state of an invitation.
///
/// `Active` is the only redeemable state; `Expired` and `Used` are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InvitationStatus {
    Active,
    Expired,
    Used,
}

impl FromStr for InvitationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(InvitationStatus::Active),
            "expired" => Ok(InvitationStatus::Expired),
            "used" => Ok(InvitationStatus::Used),
            _ => Err(format!("invalid invitation status: {}", s)),
        }
    }
}

impl InvitationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvitationStatus::Active => "active",
            InvitationStatus::Expired => "expired",
            InvitationStatus::Used => "used",
        }
    }
}

/// Invitation record
#[derive(Clone, Debug)]
pub struct Invitation {
    pub id: InvitationId,
    pub token: String,
    pub grant: Grant,
    pub status: InvitationStatus,
    pub expires_at: Option<DateTime<Utc>>, // None = never expires
    pub usage_limit: i64,
    pub remaining_uses: i64,
    pub created_by_user_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Invitation {
    /// Whether `now` is past the expiry instant.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| now > exp)
    }

    /// Status as a reader at `now` would observe it, without persisting lazy expiry.
    pub fn effective_status(&self, now: DateTime<Utc>) -> InvitationStatus {
        match self.status {
            InvitationStatus::Active if self.is_expired_at(now) => InvitationStatus::Expired,
            InvitationStatus::Active if self.remaining_uses <= 0 => InvitationStatus::Used,
            status => status,
        }
    }
}

/// Parameters for creating an invitation
#[derive(Clone, Debug)]
pub struct CreateInvitationParams {
    pub token: String,
    pub grant: Grant,
    pub expires_at: Option<DateTime<Utc>>,
    pub usage_limit: i64, // > 0; remaining_uses starts here
    pub created_by_user_id: Option<UserId>,
}
