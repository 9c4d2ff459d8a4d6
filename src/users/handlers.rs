use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    routing::{get, post},
    Json, Router,
};
use tracing::{instrument, warn};

use crate::{
    auth::jwt::AuthUser,
    error::{ApiError, AppError, RequestContext},
    i18n::MessageKey,
    state::AppState,
    users::{
        dto::{MessageResponse, PageResponse, RegisterRequest, UpdateUserRequest, UserResponse},
        pagination::{PageQuery, Pagination},
        services::{self, RegisterCommand},
    },
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", post(register).get(list_users))
        .route("/users/token/:token", post(activate))
        .route("/users/:id", get(get_user).put(update_user))
}

#[instrument(skip(state, ctx, payload))]
pub async fn register(
    State(state): State<AppState>,
    ctx: RequestContext,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(payload) = payload.map_err(|rejection| {
        warn!(error = %rejection, "register body rejected");
        ctx.reject(AppError::unreadable_body())
    })?;
    let cmd = RegisterCommand {
        username: payload.username,
        email: payload.email,
        password: payload.password,
    };
    services::register(state.store.as_ref(), state.mailer.as_ref(), cmd)
        .await
        .map_err(|e| ctx.reject(e))?;

    Ok(Json(MessageResponse {
        message: ctx.message(MessageKey::UserCreateSuccess),
    }))
}

#[instrument(skip(state, ctx, token))]
pub async fn activate(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(token): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    services::activate(state.store.as_ref(), &token)
        .await
        .map_err(|e| ctx.reject(e))?;

    Ok(Json(MessageResponse {
        message: ctx.message(MessageKey::AccountActivationSuccess),
    }))
}

/// Unparseable query strings fall back to the default page.
#[instrument(skip(state, ctx, query))]
pub async fn list_users(
    State(state): State<AppState>,
    ctx: RequestContext,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Result<Json<PageResponse>, ApiError> {
    let query = query.map(|Query(q)| q).unwrap_or_default();
    let pagination = Pagination::from_query(&query);
    let page = services::list_users(state.store.as_ref(), pagination)
        .await
        .map_err(|e| ctx.reject(e))?;
    Ok(Json(page))
}

/// A non-numeric id cannot name a user, so it is answered as not found.
#[instrument(skip(state, ctx, id))]
pub async fn get_user(
    State(state): State<AppState>,
    ctx: RequestContext,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<UserResponse>, ApiError> {
    let Path(id) = id.map_err(|rejection| {
        warn!(error = %rejection, "user id rejected");
        ctx.reject(AppError::UserNotFound)
    })?;
    let user = services::get_user(state.store.as_ref(), id)
        .await
        .map_err(|e| ctx.reject(e))?;
    Ok(Json(UserResponse { user }))
}

/// A non-numeric id never matches the caller, so it is forbidden like any
/// other mismatch. A request without a JSON body reaches validation as a
/// missing username.
#[instrument(skip(state, ctx, auth, id, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    ctx: RequestContext,
    auth: Option<AuthUser>,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Path(id) = id.map_err(|rejection| {
        warn!(error = %rejection, "user id rejected");
        ctx.reject(AppError::Forbidden)
    })?;
    let username = match payload {
        Ok(Json(body)) => body.username,
        Err(JsonRejection::MissingJsonContentType(_)) => None,
        Err(rejection) if auth.as_ref().is_some_and(|a| a.id == id) => {
            warn!(error = %rejection, "update body rejected");
            return Err(ctx.reject(AppError::unreadable_body()));
        }
        Err(_) => None,
    };
    services::update_user(state.store.as_ref(), auth.as_ref(), id, username)
        .await
        .map_err(|e| ctx.reject(e))?;

    Ok(Json(MessageResponse {
        message: ctx.message(MessageKey::UserUpdateSuccess),
    }))
}
