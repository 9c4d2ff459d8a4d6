use axum::{
    extract::{rejection::JsonRejection, FromRef, State},
    routing::post,
    Json, Router,
};
use tracing::{instrument, warn};

use crate::{
    auth::{
        dto::{LoginRequest, LoginResponse},
        jwt::JwtKeys,
        services::{authenticate, LoginCommand},
    },
    error::{ApiError, RequestContext},
    i18n::MessageKey,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new().route("/auth/login", post(login))
}

/// An unreadable body carries no credentials and fails like a bad login.
#[instrument(skip(state, ctx, payload))]
pub async fn login(
    State(state): State<AppState>,
    ctx: RequestContext,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let payload = match payload {
        Ok(Json(body)) => body,
        Err(rejection) => {
            warn!(error = %rejection, "login body rejected");
            LoginRequest::default()
        }
    };
    let cmd = LoginCommand {
        email: payload.email.unwrap_or_default(),
        password: payload.password.unwrap_or_default(),
    };
    let keys = JwtKeys::from_ref(&state);
    let session = authenticate(state.store.as_ref(), &keys, cmd)
        .await
        .map_err(|e| ctx.reject(e))?;

    Ok(Json(LoginResponse {
        message: ctx.message(MessageKey::LoginSuccess),
        token: session.token,
        user: session.user,
    }))
}
