use tracing::{error, info, warn};

use crate::{
    auth::{jwt::JwtKeys, password::verify_password},
    error::AppError,
    users::{repo::UserStore, repo_types::UserSummary, validation::is_valid_email},
};

/// Validated login input.
#[derive(Debug)]
pub struct LoginCommand {
    pub email: String,
    pub password: String,
}

/// Issued session: signed token plus the public projection of the user.
#[derive(Debug)]
pub struct Session {
    pub token: String,
    pub user: UserSummary,
}

/// Checks credentials and issues a session token.
///
/// Unknown email and wrong password both end in `AuthenticationFailure`;
/// only a caller holding the right password learns the account is unverified.
pub async fn authenticate(
    store: &dyn UserStore,
    keys: &JwtKeys,
    cmd: LoginCommand,
) -> Result<Session, AppError> {
    let email = cmd.email.trim().to_lowercase();
    if !is_valid_email(&email) {
        warn!("login with malformed email");
        return Err(AppError::AuthenticationFailure);
    }

    let Some(user) = store.find_by_email(&email).await? else {
        warn!(%email, "login unknown email");
        return Err(AppError::AuthenticationFailure);
    };

    let ok = verify_password(&cmd.password, &user.password).map_err(|e| {
        error!(error = %e, user_id = user.id, "verify_password failed");
        AppError::Unexpected(e)
    })?;
    if !ok {
        warn!(user_id = user.id, "login invalid password");
        return Err(AppError::AuthenticationFailure);
    }

    if !user.email_verified {
        warn!(user_id = user.id, "login before activation");
        return Err(AppError::AccountNotVerified);
    }

    let token = keys.sign(&user).map_err(|e| {
        error!(error = %e, user_id = user.id, "jwt sign failed");
        AppError::Unexpected(e)
    })?;

    info!(user_id = user.id, "user logged in");
    Ok(Session {
        token,
        user: UserSummary::from(&user),
    })
}
