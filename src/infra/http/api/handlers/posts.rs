use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use plaza_api_types::{
    LikeRequest, LikeResponse, PostCreateRequest, PostListQuery, PostListResponse, PostView,
};

use crate::application::feed::FeedError;
use crate::application::pagination::PageRequest;
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::identity::Viewer;
use crate::infra::http::api::models::{like_to_api, post_list_to_api, post_to_api};
use crate::infra::http::api::state::ApiState;

use super::{json_rejection, path_rejection, query_rejection};

pub async fn list_posts(
    State(state): State<ApiState>,
    query: Result<Query<PostListQuery>, QueryRejection>,
) -> Result<Json<PostListResponse>, ApiError> {
    let Query(query) = query.map_err(query_rejection)?;
    let page = PageRequest::new(query.limit, query.after_id).map_err(FeedError::from)?;
    let preview = query.comment_preview.unwrap_or(0) as usize;

    let page = state
        .feed
        .list_posts(query.sort.into(), page, preview)
        .await?;

    Ok(Json(post_list_to_api(page)))
}

pub async fn get_post(
    State(state): State<ApiState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<PostView>, ApiError> {
    let Path(id) = id.map_err(path_rejection)?;
    let post = state.feed.get_post(id).await?;
    Ok(Json(post_to_api(post, Vec::new())))
}

pub async fn create_post(
    State(state): State<ApiState>,
    Viewer(owner_id): Viewer,
    body: Result<Json<PostCreateRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PostView>), ApiError> {
    let Json(body) = body.map_err(json_rejection)?;
    let post = state
        .feed
        .create_post(owner_id, body.content, body.image_url)
        .await?;

    Ok((StatusCode::CREATED, Json(post_to_api(post, Vec::new()))))
}

pub async fn like_post(
    State(state): State<ApiState>,
    Viewer(owner_id): Viewer,
    id: Result<Path<i64>, PathRejection>,
    body: Result<Json<LikeRequest>, JsonRejection>,
) -> Result<Json<LikeResponse>, ApiError> {
    let Path(id) = id.map_err(path_rejection)?;
    let Json(body) = body.map_err(json_rejection)?;
    let outcome = state
        .likes
        .set_post_like(id, owner_id, body.is_like)
        .await?;

    Ok(Json(like_to_api(outcome)))
}
