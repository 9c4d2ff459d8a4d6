use serde::{Deserialize, Serialize};

use crate::users::repo_types::UserSummary;

/// Request body for login. Fields are optional so a missing one is an
/// authentication failure rather than a body rejection.
#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// Response returned after a successful login.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: String,
    pub token: String,
    pub user: UserSummary,
}
