use crate::server::{
    Result, ServerConfig, ServerError, ServerRouter,
    auth::AuthenticatedUser,
    extract::{Json, PageQuery, Query},
};
use axum::{extract::State, http::StatusCode};
use axum_extra::routing::{RouterExt, TypedPath};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use warble_common::model::{
    Id,
    credentials::PasswordDigest,
    post::PartialPost,
    user::{AboutMe, CreateUser, Email, User, UserHandle, UserMarker},
};
use warble_db::client::DbClient;

pub const PROFILE_AVATAR_SIZE: u32 = 128;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_post(register)
        .typed_get(get_user)
        .typed_get(get_user_posts)
        .typed_get(get_followers)
        .typed_get(get_followed)
        .typed_put(follow)
        .typed_delete(unfollow)
        .typed_put(edit_profile)
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
struct RegisterRequest {
    handle: UserHandle,
    email: Email,
    password: String,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/register", rejection(ServerError))]
struct RegisterPath();

async fn register(
    RegisterPath(): RegisterPath,
    State(db): State<Arc<DbClient>>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<User>> {
    if request.password.is_empty() {
        return Err(ServerError::EmptyPassword);
    }

    let create_user = CreateUser {
        handle: request.handle,
        email: request.email,
        password: Some(PasswordDigest::new(&request.password)?),
    };

    let mut tx = db.begin_write().await?;
    let user = tx.create_user(&create_user).await?;
    tx.commit().await?;

    info!(user_id = %user.id, handle = %user.handle, "Registered user");

    Ok(Json(user))
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
struct UserProfile {
    user: User,
    avatar: String,
    follower_count: u64,
    followed_count: u64,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/{id}", rejection(ServerError))]
struct GetUserPath {
    id: Id<UserMarker>,
}

async fn get_user(
    GetUserPath { id }: GetUserPath,
    State(db): State<Arc<DbClient>>,
) -> Result<Json<UserProfile>> {
    let mut tx = db.begin().await?;

    let user = tx
        .fetch_user(id)
        .await?
        .ok_or(ServerError::UserByIdNotFound(id))?;

    Ok(Json(UserProfile {
        avatar: user.avatar(PROFILE_AVATAR_SIZE),
        follower_count: tx.count_followers(id).await?,
        followed_count: tx.count_followed(id).await?,
        user,
    }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/{id}/posts", rejection(ServerError))]
struct GetUserPostsPath {
    id: Id<UserMarker>,
}

async fn get_user_posts(
    GetUserPostsPath { id }: GetUserPostsPath,
    State(db): State<Arc<DbClient>>,
    State(config): State<Arc<ServerConfig>>,
    Query(PageQuery { page }): Query<PageQuery>,
) -> Result<Json<Vec<PartialPost>>> {
    let posts = db
        .begin()
        .await?
        .fetch_user_posts(id, config.page(page))
        .await?
        .ok_or(ServerError::UserByIdNotFound(id))?;

    Ok(Json(posts))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/{id}/followers", rejection(ServerError))]
struct GetFollowersPath {
    id: Id<UserMarker>,
}

async fn get_followers(
    GetFollowersPath { id }: GetFollowersPath,
    State(db): State<Arc<DbClient>>,
) -> Result<Json<Vec<User>>> {
    let mut tx = db.begin().await?;

    if tx.fetch_user(id).await?.is_none() {
        return Err(ServerError::UserByIdNotFound(id));
    }

    Ok(Json(tx.fetch_followers(id).await?))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/{id}/followed", rejection(ServerError))]
struct GetFollowedPath {
    id: Id<UserMarker>,
}

async fn get_followed(
    GetFollowedPath { id }: GetFollowedPath,
    State(db): State<Arc<DbClient>>,
) -> Result<Json<Vec<User>>> {
    let mut tx = db.begin().await?;

    if tx.fetch_user(id).await?.is_none() {
        return Err(ServerError::UserByIdNotFound(id));
    }

    Ok(Json(tx.fetch_followed(id).await?))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/{id}/follow", rejection(ServerError))]
struct FollowPath {
    id: Id<UserMarker>,
}

async fn follow(
    FollowPath { id }: FollowPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<StatusCode> {
    let mut tx = db.begin_write().await?;

    if tx.fetch_user(id).await?.is_none() {
        return Err(ServerError::UserByIdNotFound(id));
    }

    tx.follow(user.user_id(), id).await?;
    tx.commit().await?;

    Ok(StatusCode::NO_CONTENT)
}

async fn unfollow(
    FollowPath { id }: FollowPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<StatusCode> {
    let mut tx = db.begin_write().await?;

    if tx.fetch_user(id).await?.is_none() {
        return Err(ServerError::UserByIdNotFound(id));
    }

    tx.unfollow(user.user_id(), id).await?;
    tx.commit().await?;

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
struct EditProfileRequest {
    about_me: Option<AboutMe>,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/me/profile", rejection(ServerError))]
struct EditProfilePath();

async fn edit_profile(
    EditProfilePath(): EditProfilePath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Json(request): Json<EditProfileRequest>,
) -> Result<Json<User>> {
    let mut tx = db.begin_write().await?;
    let updated = tx
        .update_about_me(user.user_id(), request.about_me.as_ref())
        .await?
        .ok_or(ServerError::UserByIdNotFound(user.user_id()))?;
    tx.commit().await?;

    Ok(Json(updated))
}
