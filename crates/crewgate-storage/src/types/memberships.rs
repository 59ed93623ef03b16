//! Membership types.

use chrono::{DateTime, Utc};

use super::{Grant, UserId};

/// A user's role on exactly one workspace or exactly one project.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Membership {
    pub user_id: UserId,
    pub grant: Grant,
    pub created_at: DateTime<Utc>,
}

/// Result of granting a membership that may already exist.
#[derive(Clone, Debug)]
pub struct GrantOutcome {
    /// The membership now on record (the pre-existing one if `created` is false).
    pub membership: Membership,
    pub created: bool,
}
