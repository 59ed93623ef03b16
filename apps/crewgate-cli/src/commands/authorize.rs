use crewgate_core::{AccessControl, MinimumRole};

use super::{parse_resource, require_principal, CliError};
use crate::output::AuthorizeView;

pub async fn cmd_authorize(
    access: &AccessControl,
    principal: Option<&str>,
    kind: &str,
    resource_id: &str,
    role: &str,
) -> Result<AuthorizeView, CliError> {
    let principal = require_principal(principal)?;
    let resource = parse_resource(kind, resource_id)?;
    let minimum = MinimumRole::parse(resource.kind(), role)?;
    let allowed = access.has_role(&principal, &resource, minimum).await?;
    Ok(AuthorizeView { allowed })
}
