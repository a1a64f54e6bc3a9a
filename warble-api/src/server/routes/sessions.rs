use crate::server::{
    Result, ServerConfig, ServerError, ServerRouter, auth::AuthenticatedUser, extract::Json,
};
use axum::{extract::State, http::StatusCode};
use axum_extra::routing::{RouterExt, TypedPath};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use time::UtcDateTime;
use tracing::info;
use warble_common::model::{
    Id,
    session::SessionToken,
    user::{UserHandle, UserMarker},
};
use warble_db::client::DbClient;

pub fn routes() -> ServerRouter {
    ServerRouter::new().typed_post(login).typed_post(logout)
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
struct LoginRequest {
    handle: UserHandle,
    password: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
struct LoginResponse {
    user_id: Id<UserMarker>,
    token: String,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/sessions/login", rejection(ServerError))]
struct LoginPath();

async fn login(
    LoginPath(): LoginPath,
    State(db): State<Arc<DbClient>>,
    State(config): State<Arc<ServerConfig>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    let user = db
        .begin()
        .await?
        .fetch_user_by_handle(&request.handle)
        .await?;
    let user = user
        .filter(|user| user.check_password(&request.password))
        .ok_or(ServerError::InvalidCredentials)?;

    let (token, session) =
        SessionToken::issue(user.id, UtcDateTime::now(), config.session_lifetime)?;

    let mut tx = db.begin_write().await?;
    tx.create_session(&session).await?;
    tx.commit().await?;

    info!(user_id = %user.id, "User logged in");

    Ok(Json(LoginResponse {
        user_id: user.id,
        token: token.to_string(),
    }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/sessions/logout", rejection(ServerError))]
struct LogoutPath();

async fn logout(
    LogoutPath(): LogoutPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<StatusCode> {
    let mut tx = db.begin_write().await?;
    tx.delete_session(user.token_hash()).await?;
    tx.commit().await?;

    Ok(StatusCode::NO_CONTENT)
}
