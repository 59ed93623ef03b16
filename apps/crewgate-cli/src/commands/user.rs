use crewgate_core::AccessControl;
use crewgate_storage::CreateUserParams;

use super::CliError;
use crate::output::UserView;

pub async fn cmd_user_create(access: &AccessControl, email: &str) -> Result<UserView, CliError> {
    let user = access
        .store()
        .create_user(&CreateUserParams {
            email: email.to_string(),
        })
        .await
        .map_err(CliError::store("failed to create user"))?;
    Ok(user.into())
}
