use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use plaza_api_types::{
    CommentCreateRequest, CommentListQuery, CommentListResponse, CommentView, LikeRequest,
    LikeResponse,
};

use crate::application::feed::FeedError;
use crate::application::pagination::PageRequest;
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::identity::Viewer;
use crate::infra::http::api::models::{comment_list_to_api, comment_to_api, like_to_api};
use crate::infra::http::api::state::ApiState;

use super::{json_rejection, path_rejection, query_rejection};

pub async fn list_comments(
    State(state): State<ApiState>,
    post_id: Result<Path<i64>, PathRejection>,
    query: Result<Query<CommentListQuery>, QueryRejection>,
) -> Result<Json<CommentListResponse>, ApiError> {
    let Path(post_id) = post_id.map_err(path_rejection)?;
    let Query(query) = query.map_err(query_rejection)?;
    let page = PageRequest::new(query.limit, query.after_id).map_err(FeedError::from)?;

    let thread = state.feed.list_comments(post_id, page).await?;
    Ok(Json(comment_list_to_api(thread)))
}

pub async fn create_comment(
    State(state): State<ApiState>,
    Viewer(owner_id): Viewer,
    post_id: Result<Path<i64>, PathRejection>,
    body: Result<Json<CommentCreateRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CommentView>), ApiError> {
    let Path(post_id) = post_id.map_err(path_rejection)?;
    let Json(body) = body.map_err(json_rejection)?;
    let comment = state
        .feed
        .create_comment(post_id, owner_id, body.content, body.reply_to)
        .await?;

    Ok((StatusCode::CREATED, Json(comment_to_api(comment))))
}

pub async fn like_comment(
    State(state): State<ApiState>,
    Viewer(owner_id): Viewer,
    id: Result<Path<i64>, PathRejection>,
    body: Result<Json<LikeRequest>, JsonRejection>,
) -> Result<Json<LikeResponse>, ApiError> {
    let Path(id) = id.map_err(path_rejection)?;
    let Json(body) = body.map_err(json_rejection)?;
    let outcome = state
        .likes
        .set_comment_like(id, owner_id, body.is_like)
        .await?;

    Ok(Json(like_to_api(outcome)))
}
