use serde::{Deserialize, Serialize};

use crate::users::repo_types::UserSummary;

/// Request body for registration. Every field may be absent or null;
/// validation reports those per field.
#[derive(Debug, Default, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub user: UserSummary,
}

/// One page of verified users.
#[derive(Debug, Serialize)]
pub struct PageResponse {
    pub content: Vec<UserSummary>,
    pub page: i64,
    pub size: i64,
    #[serde(rename = "totalPages")]
    pub total_pages: i64,
}
