//! Domain entities mirrored from persistent storage.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostRecord {
    pub id: i64,
    pub owner_id: i64,
    pub username: String,
    pub avatar: String,
    pub status: String,
    pub content: Option<String>,
    pub image_url: Option<String>,
    pub like_count: i64,
    pub comment_count: i64,
    pub profile_version: i64,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Comments are also the payload of the top-comments cache, so they round-trip
/// through JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentRecord {
    pub id: i64,
    pub post_id: i64,
    pub owner_id: i64,
    pub username: String,
    pub avatar: String,
    pub content: String,
    pub reply_to: Option<String>,
    pub like_count: i64,
    pub profile_version: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Display fields of an account, as published by the account service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountProfile {
    pub id: i64,
    pub username: String,
    pub avatar: String,
    pub status: String,
    pub profile_version: i64,
    pub updated_at: OffsetDateTime,
}
