use crate::server::{
    Result, ServerConfig, ServerError, ServerRouter,
    auth::AuthenticatedUser,
    extract::{Json, PageQuery, Query},
};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use serde::Deserialize;
use std::sync::Arc;
use warble_common::model::{
    Id,
    post::{CreatePost, PartialPost, Post, PostContent, PostMarker},
};
use warble_db::client::DbClient;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(get_post)
        .typed_post(create_post)
        .typed_get(get_feed)
        .typed_get(get_explore)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}", rejection(ServerError))]
struct GetPostPath {
    id: Id<PostMarker>,
}

async fn get_post(
    GetPostPath { id }: GetPostPath,
    State(db): State<Arc<DbClient>>,
) -> Result<Json<Post>> {
    let post = db
        .begin()
        .await?
        .fetch_post(id)
        .await?
        .ok_or(ServerError::PostByIdNotFound(id))?;

    Ok(Json(post))
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
struct CreatePostRequest {
    content: PostContent,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/create", rejection(ServerError))]
struct CreatePostPath();

async fn create_post(
    CreatePostPath(): CreatePostPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Json(request): Json<CreatePostRequest>,
) -> Result<Json<PartialPost>> {
    let mut tx = db.begin_write().await?;
    let post = tx
        .create_post(user.user_id(), &CreatePost::now(request.content))
        .await?;
    tx.commit().await?;

    Ok(Json(post))
}

/// Posts by the caller and everyone they follow, newest first.
#[derive(TypedPath, Deserialize)]
#[typed_path("/feed", rejection(ServerError))]
struct FeedPath();

async fn get_feed(
    FeedPath(): FeedPath,
    State(db): State<Arc<DbClient>>,
    State(config): State<Arc<ServerConfig>>,
    user: AuthenticatedUser,
    Query(PageQuery { page }): Query<PageQuery>,
) -> Result<Json<Vec<Post>>> {
    let posts = db
        .begin()
        .await?
        .fetch_followed_posts(user.user_id(), config.page(page))
        .await?;

    Ok(Json(posts))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/explore", rejection(ServerError))]
struct ExplorePath();

async fn get_explore(
    ExplorePath(): ExplorePath,
    State(db): State<Arc<DbClient>>,
    State(config): State<Arc<ServerConfig>>,
    Query(PageQuery { page }): Query<PageQuery>,
) -> Result<Json<Vec<Post>>> {
    let posts = db
        .begin()
        .await?
        .fetch_recent_posts(config.page(page))
        .await?;

    Ok(Json(posts))
}
