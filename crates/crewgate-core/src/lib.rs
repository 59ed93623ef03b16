//! Invitation and role-based membership authorization for crewgate.
//!
//! [`AccessControl`] ties the three operations together over any [`Store`]:
//!
//! - issuing invitations for a workspace or project role ([`issuer`]),
//! - redeeming an invitation token into a membership ([`redeemer`]),
//! - answering "does this principal hold at least role R here" ([`resolver`]).
//!
//! Principals are always passed explicitly as a [`UserId`]; authentication
//! happens before a call reaches this crate.

use std::sync::Arc;

use crewgate_storage::Store;
#[cfg(doc)]
use crewgate_storage::UserId;

pub mod config;
pub mod error;
pub mod issuer;
pub mod redeemer;
pub mod resolver;
pub mod token;

pub use config::{AccessConfig, ConfigError};
pub use error::AccessError;
pub use issuer::{IssueInvitation, IssueRequest, IssuedInvitation};
pub use redeemer::Redemption;
pub use resolver::MinimumRole;

#[derive(Clone)]
pub struct AccessControl {
    store: Arc<dyn Store>,
    config: AccessConfig,
}

impl AccessControl {
    pub fn new(store: Arc<dyn Store>, config: AccessConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn config(&self) -> &AccessConfig {
        &self.config
    }
}
