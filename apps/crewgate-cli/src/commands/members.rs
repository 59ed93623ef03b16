use crewgate_core::AccessControl;

use super::{parse_resource, require_principal, CliError};
use crate::output::MembershipView;

pub async fn cmd_members_list(
    access: &AccessControl,
    principal: Option<&str>,
    kind: &str,
    target_id: &str,
) -> Result<Vec<MembershipView>, CliError> {
    let requested_by = require_principal(principal)?;
    let resource = parse_resource(kind, target_id)?;
    let members = access.list_members(&resource, &requested_by).await?;
    Ok(members.into_iter().map(Into::into).collect())
}
