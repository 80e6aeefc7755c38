//! Wire types shared by the Plaza feed API and its clients.
//!
//! Identifiers are 64-bit integers assigned by the server; timestamps are
//! RFC 3339 strings.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Ordering applied to the post feed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedSort {
    /// Newest first.
    #[default]
    Time,
    /// Most liked first.
    Like,
    /// Most commented first.
    Comment,
}

impl FeedSort {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedSort::Time => "time",
            FeedSort::Like => "like",
            FeedSort::Comment => "comment",
        }
    }
}

// -------- requests --------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostCreateRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentCreateRequest {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LikeRequest {
    pub is_like: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostListQuery {
    #[serde(default)]
    pub sort: FeedSort,
    pub after_id: Option<i64>,
    pub limit: Option<u32>,
    /// Number of newest comments to embed per post.
    pub comment_preview: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommentListQuery {
    pub after_id: Option<i64>,
    pub limit: Option<u32>,
}

// -------- responses --------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostView {
    pub id: i64,
    pub owner_id: i64,
    pub username: String,
    pub avatar: String,
    pub status: String,
    pub content: Option<String>,
    pub image_url: Option<String>,
    pub like_count: i64,
    pub comment_count: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub preloaded_comments: Vec<CommentView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentView {
    pub id: i64,
    pub post_id: i64,
    pub owner_id: i64,
    pub username: String,
    pub avatar: String,
    pub content: String,
    pub reply_to: Option<String>,
    pub like_count: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostListResponse {
    pub posts: Vec<PostView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<i64>,
    pub has_more: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentListResponse {
    pub comments: Vec<CommentView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<i64>,
    pub has_more: bool,
    pub total: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeResponse {
    pub changed: bool,
    pub is_liked: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorMessage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorMessage {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}
