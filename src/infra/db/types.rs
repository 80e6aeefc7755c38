use time::OffsetDateTime;

use crate::domain::entities::{AccountProfile, CommentRecord, PostRecord};

#[derive(sqlx::FromRow)]
pub(crate) struct PostRow {
    pub(crate) id: i64,
    pub(crate) owner_id: i64,
    pub(crate) username: String,
    pub(crate) avatar: String,
    pub(crate) status: String,
    pub(crate) content: Option<String>,
    pub(crate) image_url: Option<String>,
    pub(crate) like_count: i64,
    pub(crate) comment_count: i64,
    pub(crate) profile_version: i64,
    pub(crate) created_at: OffsetDateTime,
    pub(crate) updated_at: OffsetDateTime,
}

impl From<PostRow> for PostRecord {
    fn from(row: PostRow) -> Self {
        Self {
            id: row.id,
            owner_id: row.owner_id,
            username: row.username,
            avatar: row.avatar,
            status: row.status,
            content: row.content,
            image_url: row.image_url,
            like_count: row.like_count,
            comment_count: row.comment_count,
            profile_version: row.profile_version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct CommentRow {
    pub(crate) id: i64,
    pub(crate) post_id: i64,
    pub(crate) owner_id: i64,
    pub(crate) username: String,
    pub(crate) avatar: String,
    pub(crate) content: String,
    pub(crate) reply_to: Option<String>,
    pub(crate) like_count: i64,
    pub(crate) profile_version: i64,
    pub(crate) created_at: OffsetDateTime,
    pub(crate) updated_at: OffsetDateTime,
}

impl From<CommentRow> for CommentRecord {
    fn from(row: CommentRow) -> Self {
        Self {
            id: row.id,
            post_id: row.post_id,
            owner_id: row.owner_id,
            username: row.username,
            avatar: row.avatar,
            content: row.content,
            reply_to: row.reply_to,
            like_count: row.like_count,
            profile_version: row.profile_version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct AccountRow {
    pub(crate) id: i64,
    pub(crate) username: String,
    pub(crate) avatar: String,
    pub(crate) status: String,
    pub(crate) profile_version: i64,
    pub(crate) updated_at: OffsetDateTime,
}

impl From<AccountRow> for AccountProfile {
    fn from(row: AccountRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            avatar: row.avatar,
            status: row.status,
            profile_version: row.profile_version,
            updated_at: row.updated_at,
        }
    }
}
