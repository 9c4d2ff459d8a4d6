use std::collections::BTreeMap;
use std::convert::Infallible;

use axum::{
    async_trait,
    extract::{FromRequestParts, OriginalUri},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{error, warn};

use crate::{
    i18n::{translate, Lang, MessageKey},
    mail::MailError,
    users::{repo::StoreError, validation::ValidationErrors},
};

/// Every failure a workflow can report to its caller.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation failed on {} field(s)", .0.len())]
    Validation(ValidationErrors),
    #[error("invalid activation token")]
    InvalidToken,
    #[error("invalid credentials")]
    AuthenticationFailure,
    #[error("account not verified")]
    AccountNotVerified,
    #[error("forbidden")]
    Forbidden,
    #[error("user not found")]
    UserNotFound,
    #[error("activation email could not be delivered")]
    EmailDelivery(#[source] MailError),
    #[error("unexpected failure")]
    Unexpected(#[source] anyhow::Error),
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        AppError::Unexpected(e.into())
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::InvalidToken => StatusCode::BAD_REQUEST,
            Self::AuthenticationFailure => StatusCode::UNAUTHORIZED,
            Self::AccountNotVerified | Self::Forbidden => StatusCode::FORBIDDEN,
            Self::UserNotFound => StatusCode::NOT_FOUND,
            Self::EmailDelivery(_) | Self::Unexpected(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// A request body that never reached the workflow: broken JSON, wrong
    /// field types or a missing JSON content type.
    pub fn unreadable_body() -> Self {
        AppError::Validation(ValidationErrors::single("body", MessageKey::BodyInvalid))
    }

    pub fn message_key(&self) -> MessageKey {
        match self {
            Self::Validation(_) => MessageKey::ValidationFailure,
            Self::InvalidToken => MessageKey::AccountActivationFailure,
            Self::AuthenticationFailure => MessageKey::AuthenticationFailure,
            Self::AccountNotVerified => MessageKey::AccountNotVerified,
            Self::Forbidden => MessageKey::UnauthorizedUserUpdate,
            Self::UserNotFound => MessageKey::UserNotFound,
            Self::EmailDelivery(_) => MessageKey::EmailFailure,
            Self::Unexpected(_) => MessageKey::UnexpectedFailure,
        }
    }
}

/// Per-request data the error body and translated messages need.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub path: String,
    pub lang: Lang,
}

impl RequestContext {
    pub fn reject(&self, error: AppError) -> ApiError {
        ApiError {
            path: self.path.clone(),
            lang: self.lang,
            error,
        }
    }

    pub fn message(&self, key: MessageKey) -> String {
        translate(key, self.lang).to_string()
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for RequestContext {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let OriginalUri(uri) = OriginalUri::from_request_parts(parts, state).await?;
        let lang = Lang::from_request_parts(parts, state).await?;
        let path = uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| uri.path().to_string());
        Ok(Self { path, lang })
    }
}

/// An [`AppError`] bound to the request it answers.
#[derive(Debug)]
pub struct ApiError {
    path: String,
    lang: Lang,
    error: AppError,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub path: String,
    pub timestamp: i64,
    pub message: String,
    #[serde(rename = "validationErrors", skip_serializing_if = "Option::is_none")]
    pub validation_errors: Option<BTreeMap<String, String>>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.error.status();
        let key = self.error.message_key();
        if status.is_server_error() {
            error!(path = %self.path, key = key.as_str(), error = %error_chain(&self.error), "request failed");
        } else {
            warn!(path = %self.path, key = key.as_str(), %status, "request rejected");
        }

        let validation_errors = match &self.error {
            AppError::Validation(errors) => Some(
                errors
                    .iter()
                    .map(|(field, k)| (field.to_string(), translate(*k, self.lang).to_string()))
                    .collect(),
            ),
            _ => None,
        };

        let body = ErrorBody {
            path: self.path,
            timestamp: (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64,
            message: translate(key, self.lang).to_string(),
            validation_errors,
        };
        (status, Json(body)).into_response()
    }
}

fn error_chain(error: &AppError) -> String {
    let mut out = error.to_string();
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = std::error::Error::source(cause);
    }
    out
}
