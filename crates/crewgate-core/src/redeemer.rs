//! Invitation redemption.
//!
//! Steps after the token lookup run inside one [`RedemptionTxn`]: the invitation
//! row is locked, checked, the membership granted and one use consumed before a
//! single commit. Any early return drops the transaction, which rolls it back,
//! except for the two terminal transitions (expired, exhausted) which are
//! committed on their own before failing.

use chrono::{DateTime, Utc};
use crewgate_storage::{
    Invitation, InvitationStatus, Membership, RedemptionTxn, StoreError, UserId,
};
use tracing::{debug, info};

use crate::{AccessControl, AccessError};

/// Outcome of a successful redemption.
#[derive(Clone, Debug)]
pub struct Redemption {
    /// The membership as stored; on re-redemption this is the pre-existing row.
    pub membership: Membership,
    pub newly_granted: bool,
    pub remaining_uses: i64,
    pub status: InvitationStatus,
}

fn not_redeemable(status: InvitationStatus) -> Option<AccessError> {
    match status {
        InvitationStatus::Active => None,
        InvitationStatus::Expired => Some(AccessError::InvitationExpired),
        InvitationStatus::Used => Some(AccessError::InvitationExhausted),
    }
}

impl AccessControl {
    pub async fn redeem_invitation(
        &self,
        token: &str,
        principal: Option<&UserId>,
    ) -> Result<Redemption, AccessError> {
        self.redeem_invitation_at(token, principal, Utc::now()).await
    }

    /// Redeem with an explicit clock reading for the expiry check.
    pub async fn redeem_invitation_at(
        &self,
        token: &str,
        principal: Option<&UserId>,
        now: DateTime<Utc>,
    ) -> Result<Redemption, AccessError> {
        let principal = principal.ok_or(AccessError::Unauthenticated)?;
        if token.is_empty() {
            return Err(AccessError::InvalidToken);
        }
        match self.store.get_user(principal).await {
            Ok(_) => {}
            Err(StoreError::NotFound) => return Err(AccessError::Unauthenticated),
            Err(e) => return Err(e.into()),
        }

        let mut txn = self.store.begin_redemption().await?;
        let invitation = match txn.lock_invitation(token).await {
            Ok(inv) => inv,
            Err(StoreError::NotFound) => return Err(AccessError::InvalidToken),
            Err(e) => return Err(e.into()),
        };

        if let Some(err) = not_redeemable(invitation.status) {
            debug!(
                "invitation {} is {}, refusing redemption",
                invitation.id.0,
                invitation.status.as_str()
            );
            return Err(err);
        }

        if invitation.is_expired_at(now) {
            Self::finish_terminal(txn, &invitation, InvitationStatus::Expired).await?;
            return Err(AccessError::InvitationExpired);
        }
        if invitation.remaining_uses <= 0 {
            Self::finish_terminal(txn, &invitation, InvitationStatus::Used).await?;
            return Err(AccessError::InvitationExhausted);
        }

        let outcome = txn.grant_membership(principal, &invitation.grant).await?;
        let (remaining_uses, status) = match txn.consume_invitation_use(&invitation.id).await {
            Ok(consumed) => consumed,
            Err(StoreError::Conflict) => return Err(AccessError::InvitationExhausted),
            Err(e) => return Err(e.into()),
        };
        txn.commit().await?;

        info!(
            "user {} redeemed invitation {} for {} {} (role={}, new={}, remaining={})",
            principal.0,
            invitation.id.0,
            invitation.grant.kind().as_str(),
            invitation.grant.resource().id(),
            outcome.membership.grant.role_str(),
            outcome.created,
            remaining_uses
        );

        Ok(Redemption {
            membership: outcome.membership,
            newly_granted: outcome.created,
            remaining_uses,
            status,
        })
    }

    async fn finish_terminal(
        mut txn: Box<dyn RedemptionTxn>,
        invitation: &Invitation,
        status: InvitationStatus,
    ) -> Result<(), AccessError> {
        txn.set_invitation_status(&invitation.id, status).await?;
        txn.commit().await?;
        info!(
            "invitation {} is now {}",
            invitation.id.0,
            status.as_str()
        );
        Ok(())
    }

    /// Look up an invitation for display, with its status as of `now`.
    ///
    /// Nothing is persisted; a lapsed invitation only becomes `Expired` in
    /// storage once someone tries to redeem it.
    pub async fn inspect_invitation(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Invitation, AccessError> {
        if token.is_empty() {
            return Err(AccessError::InvalidToken);
        }
        let mut invitation = match self.store.get_invitation_by_token(token).await {
            Ok(inv) => inv,
            Err(StoreError::NotFound) => return Err(AccessError::InvalidToken),
            Err(e) => return Err(e.into()),
        };
        invitation.status = invitation.effective_status(now);
        Ok(invitation)
    }
}
