//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;

use crate::application::pagination::{CursorPage, PageRequest, PaginationError};
use crate::domain::entities::{AccountProfile, CommentRecord, PostRecord};
use crate::domain::types::SortMode;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
    #[error(transparent)]
    Pagination(#[from] PaginationError),
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct CreatePostParams {
    pub owner_id: i64,
    pub username: String,
    pub avatar: String,
    pub status: String,
    pub profile_version: i64,
    pub content: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreateCommentParams {
    pub post_id: i64,
    pub owner_id: i64,
    pub username: String,
    pub avatar: String,
    pub profile_version: i64,
    pub content: String,
    pub reply_to: Option<String>,
}

/// Rows touched while copying one account's display fields onto its content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProfileSyncCounts {
    pub posts: u64,
    pub comments: u64,
}

/// Rows removed or repaired by one orphan cleanup pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrphanCleanupReport {
    pub comments: u64,
    pub posts: u64,
    pub post_likes: u64,
    pub comment_likes: u64,
    pub repaired_posts: u64,
    pub repaired_comments: u64,
}

impl OrphanCleanupReport {
    pub fn removed_total(&self) -> u64 {
        self.comments + self.posts + self.post_likes + self.comment_likes
    }

    pub fn is_empty(&self) -> bool {
        self.removed_total() == 0 && self.repaired_posts == 0 && self.repaired_comments == 0
    }
}

#[async_trait]
pub trait PostsRepo: Send + Sync {
    async fn find_post(&self, id: i64) -> Result<Option<PostRecord>, RepoError>;

    /// List posts in `(sort key DESC, id DESC)` order strictly after `page.after_id`.
    async fn list_posts(
        &self,
        sort: SortMode,
        page: PageRequest,
    ) -> Result<CursorPage<PostRecord>, RepoError>;
}

#[async_trait]
pub trait PostsWriteRepo: Send + Sync {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError>;
}

#[async_trait]
pub trait CommentsRepo: Send + Sync {
    async fn find_comment(&self, id: i64) -> Result<Option<CommentRecord>, RepoError>;

    /// List a post's comments newest first, strictly after `page.after_id`.
    async fn list_comments(
        &self,
        post_id: i64,
        page: PageRequest,
    ) -> Result<CursorPage<CommentRecord>, RepoError>;

    async fn count_comments(&self, post_id: i64) -> Result<i64, RepoError>;

    /// The `limit` newest comments of a post, newest first.
    async fn latest_comments(
        &self,
        post_id: i64,
        limit: u32,
    ) -> Result<Vec<CommentRecord>, RepoError>;
}

#[async_trait]
pub trait CommentsWriteRepo: Send + Sync {
    /// Insert the comment and bump the parent's `comment_count` in one transaction.
    /// Returns [`RepoError::NotFound`] when the post does not exist.
    async fn create_comment(
        &self,
        params: CreateCommentParams,
    ) -> Result<CommentRecord, RepoError>;
}

#[async_trait]
pub trait LikesRepo: Send + Sync {
    async fn post_liked(&self, post_id: i64, owner_id: i64) -> Result<bool, RepoError>;

    async fn comment_liked(&self, comment_id: i64, owner_id: i64) -> Result<bool, RepoError>;

    /// Insert or delete the like row and adjust `like_count` by one, atomically.
    /// Returns `false` when the join row was already in the requested state.
    async fn apply_post_like(
        &self,
        post_id: i64,
        owner_id: i64,
        liked: bool,
    ) -> Result<bool, RepoError>;

    async fn apply_comment_like(
        &self,
        comment_id: i64,
        owner_id: i64,
        liked: bool,
    ) -> Result<bool, RepoError>;
}

/// Read-only view of the account service's profiles.
#[async_trait]
pub trait AccountsRepo: Send + Sync {
    async fn find_account(&self, id: i64) -> Result<Option<AccountProfile>, RepoError>;

    async fn list_changed_since(
        &self,
        since: OffsetDateTime,
    ) -> Result<Vec<AccountProfile>, RepoError>;
}

#[async_trait]
pub trait ReconcileRepo: Send + Sync {
    /// Copy the profile onto posts and comments whose `profile_version` is behind it.
    async fn sync_profile(&self, profile: &AccountProfile) -> Result<ProfileSyncCounts, RepoError>;

    /// Remove rows whose referents are gone and repair drifted counters.
    async fn cleanup_orphans(&self) -> Result<OrphanCleanupReport, RepoError>;
}
