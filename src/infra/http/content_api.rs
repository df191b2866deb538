//! Read-only content API.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};

use crate::application::content::PostQuery;
use crate::domain::content::{AuthorRecord, Post};

use super::error::JsonError;
use super::internal::InternalState;

const SOURCE: &str = "infra::http::content_api";
const POST_NOT_FOUND: &str = "Post not found";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct PostListQuery {
    tag: Option<String>,
    author: Option<u64>,
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub(super) struct PostsResponse {
    posts: Vec<Post>,
}

#[derive(Debug, Serialize)]
pub(super) struct PostResponse {
    post: Post,
}

#[derive(Debug, Serialize)]
pub(super) struct AuthorsResponse {
    authors: Vec<AuthorRecord>,
}

pub(super) async fn list_posts(
    State(state): State<InternalState>,
    Query(query): Query<PostListQuery>,
) -> Result<Json<PostsResponse>, JsonError> {
    let posts = state
        .content
        .posts(PostQuery {
            tag: query.tag.filter(|tag| !tag.is_empty()),
            author: query.author,
            limit: query.limit,
        })
        .await
        .map_err(|err| JsonError::from_app(SOURCE, err))?;
    Ok(Json(PostsResponse { posts }))
}

/// Non-numeric ids are treated as unknown posts.
pub(super) async fn get_post(
    State(state): State<InternalState>,
    Path(id): Path<String>,
) -> Result<Json<PostResponse>, JsonError> {
    let id: u64 = id
        .parse()
        .map_err(|_| JsonError::not_found(SOURCE, POST_NOT_FOUND))?;
    let post = state
        .content
        .post(id)
        .await
        .map_err(|err| JsonError::from_app(SOURCE, err))?
        .ok_or_else(|| JsonError::not_found(SOURCE, POST_NOT_FOUND))?;
    Ok(Json(PostResponse { post }))
}

pub(super) async fn list_authors(
    State(state): State<InternalState>,
) -> Result<Json<AuthorsResponse>, JsonError> {
    let authors = state
        .content
        .authors()
        .await
        .map_err(|err| JsonError::from_app(SOURCE, err))?;
    Ok(Json(AuthorsResponse { authors }))
}
