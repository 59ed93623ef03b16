use chrono::{DateTime, TimeDelta, Utc};
use crewgate_core::{AccessControl, IssueRequest, IssuedInvitation};

use super::{parse_principal, parse_resource, require_principal, CliError};
use crate::output::{InvitationView, RedemptionView};

#[allow(clippy::too_many_arguments)]
pub async fn cmd_invite_issue(
    access: &AccessControl,
    principal: Option<&str>,
    kind: &str,
    target_id: &str,
    role: &str,
    expires_at: Option<DateTime<Utc>>,
    expires_hours: Option<i64>,
    usage_limit: Option<i64>,
) -> Result<IssuedInvitation, CliError> {
    let issued_by = parse_principal(principal)?;
    let expires_at = match (expires_at, expires_hours) {
        (Some(at), _) => Some(at),
        (None, Some(hours)) => Some(expiry_after_hours(Utc::now(), hours)?),
        (None, None) => None,
    };

    let request = IssueRequest {
        kind: kind.to_string(),
        target_id: target_id.to_string(),
        role: role.to_string(),
        expires_at,
        usage_limit,
    }
    .into_invitation(issued_by)?;

    Ok(access.issue_invitation(request).await?)
}

/// `now + hours`, or `InvalidExpiry` when either step leaves chrono's range.
pub fn expiry_after_hours(now: DateTime<Utc>, hours: i64) -> Result<DateTime<Utc>, CliError> {
    TimeDelta::try_hours(hours)
        .and_then(|delta| now.checked_add_signed(delta))
        .ok_or(CliError::InvalidExpiry(hours))
}

pub async fn cmd_invite_show(
    access: &AccessControl,
    token: &str,
) -> Result<InvitationView, CliError> {
    let invitation = access.inspect_invitation(token, Utc::now()).await?;
    Ok(invitation.into())
}

pub async fn cmd_invite_list(
    access: &AccessControl,
    principal: Option<&str>,
    kind: &str,
    target_id: &str,
) -> Result<Vec<InvitationView>, CliError> {
    let requested_by = require_principal(principal)?;
    let resource = parse_resource(kind, target_id)?;
    let now = Utc::now();
    let invitations = access.list_invitations(&resource, &requested_by).await?;
    Ok(invitations
        .into_iter()
        .map(|mut inv| {
            inv.status = inv.effective_status(now);
            inv.into()
        })
        .collect())
}

pub async fn cmd_invite_redeem(
    access: &AccessControl,
    principal: Option<&str>,
    token: &str,
) -> Result<RedemptionView, CliError> {
    let principal = parse_principal(principal)?;
    let redemption = access.redeem_invitation(token, principal.as_ref()).await?;
    Ok(redemption.into())
}
