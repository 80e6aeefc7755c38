//! Post feed, comment threads and their write paths.

use std::sync::Arc;

use futures::future::join_all;
use thiserror::Error;
use tracing::{info, warn};

use crate::application::pagination::{CursorPage, PageRequest, PaginationError};
use crate::application::repos::{
    AccountsRepo, CommentsRepo, CommentsWriteRepo, CreateCommentParams, CreatePostParams,
    PostsRepo, PostsWriteRepo, RepoError,
};
use crate::cache::CommentCache;
use crate::domain::entities::{AccountProfile, CommentRecord, PostRecord};
use crate::domain::error::DomainError;
use crate::domain::posts::{ContentLimits, NewCommentBody, NewPostBody};
use crate::domain::types::SortMode;

/// Coarse classification used by callers to pick a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidArgument,
    Conflict,
    Internal,
}

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("{0} not found")]
    NotFound(&'static str),
    /// The cursor row no longer exists (or belongs to another listing).
    #[error("invalid cursor: {0}")]
    InvalidCursor(i64),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    Repo(RepoError),
}

impl FeedError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FeedError::NotFound(_) | FeedError::InvalidCursor(_) => ErrorKind::NotFound,
            FeedError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            FeedError::Conflict(_) => ErrorKind::Conflict,
            FeedError::Repo(_) => ErrorKind::Internal,
        }
    }
}

impl From<PaginationError> for FeedError {
    fn from(err: PaginationError) -> Self {
        match err {
            PaginationError::InvalidCursor(id) => FeedError::InvalidCursor(id),
            PaginationError::InvalidLimit(_) => FeedError::InvalidArgument(err.to_string()),
        }
    }
}

impl From<RepoError> for FeedError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound => FeedError::NotFound("resource"),
            RepoError::Pagination(inner) => inner.into(),
            RepoError::InvalidInput { message } => FeedError::InvalidArgument(message),
            RepoError::Duplicate { constraint } => {
                FeedError::Conflict(format!("unique constraint `{constraint}`"))
            }
            RepoError::Integrity { message } => FeedError::Conflict(message),
            other @ (RepoError::Timeout | RepoError::Persistence(_)) => FeedError::Repo(other),
        }
    }
}

impl From<DomainError> for FeedError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::NotFound { entity } => FeedError::NotFound(entity),
            DomainError::Validation { message } => FeedError::InvalidArgument(message),
        }
    }
}

/// A feed item together with its embedded comment preview.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedItem {
    pub post: PostRecord,
    pub preview: Vec<CommentRecord>,
}

/// One page of a comment thread plus the thread's total size.
#[derive(Debug, Clone)]
pub struct CommentThreadPage {
    pub page: CursorPage<CommentRecord>,
    pub total: i64,
}

#[derive(Clone)]
pub struct FeedService {
    posts: Arc<dyn PostsRepo>,
    posts_write: Arc<dyn PostsWriteRepo>,
    comments: Arc<dyn CommentsRepo>,
    comments_write: Arc<dyn CommentsWriteRepo>,
    accounts: Arc<dyn AccountsRepo>,
    cache: CommentCache,
    limits: ContentLimits,
}

impl FeedService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        posts_write: Arc<dyn PostsWriteRepo>,
        comments: Arc<dyn CommentsRepo>,
        comments_write: Arc<dyn CommentsWriteRepo>,
        accounts: Arc<dyn AccountsRepo>,
        cache: CommentCache,
    ) -> Self {
        Self {
            posts,
            posts_write,
            comments,
            comments_write,
            accounts,
            cache,
            limits: ContentLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: ContentLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn cache(&self) -> &CommentCache {
        &self.cache
    }

    /// One feed page. When `preview` is non-zero each post carries up to that
    /// many newest comments, served through the comment cache.
    pub async fn list_posts(
        &self,
        sort: SortMode,
        page: PageRequest,
        preview: usize,
    ) -> Result<CursorPage<FeedItem>, FeedError> {
        let posts = self.posts.list_posts(sort, page).await?;

        if preview == 0 {
            return Ok(posts.map(|post| FeedItem {
                post,
                preview: Vec::new(),
            }));
        }

        let previews = join_all(
            posts
                .items
                .iter()
                .map(|post| self.preview_for(post.id, preview)),
        )
        .await;

        let CursorPage {
            items,
            next_cursor,
            has_more,
        } = posts;
        let items = items
            .into_iter()
            .zip(previews)
            .map(|(post, preview)| FeedItem { post, preview })
            .collect();

        Ok(CursorPage {
            items,
            next_cursor,
            has_more,
        })
    }

    pub async fn get_post(&self, id: i64) -> Result<PostRecord, FeedError> {
        self.posts
            .find_post(id)
            .await?
            .ok_or(FeedError::NotFound("post"))
    }

    pub async fn create_post(
        &self,
        owner_id: i64,
        content: Option<String>,
        image_url: Option<String>,
    ) -> Result<PostRecord, FeedError> {
        let body = NewPostBody::parse(content, image_url, &self.limits)?;
        let owner = self.owner(owner_id).await?;

        let post = self
            .posts_write
            .create_post(CreatePostParams {
                owner_id: owner.id,
                username: owner.username,
                avatar: owner.avatar,
                status: owner.status,
                profile_version: owner.profile_version,
                content: body.content,
                image_url: body.image_url,
            })
            .await?;

        info!(
            target = "plaza::application::feed",
            post_id = post.id,
            owner_id = post.owner_id,
            "post created"
        );
        Ok(post)
    }

    /// A page of a post's comments, newest first.
    pub async fn list_comments(
        &self,
        post_id: i64,
        page: PageRequest,
    ) -> Result<CommentThreadPage, FeedError> {
        self.get_post(post_id).await?;

        let page = self.comments.list_comments(post_id, page).await?;
        let total = self.comments.count_comments(post_id).await?;
        Ok(CommentThreadPage { page, total })
    }

    /// Store a comment and bump the post's counter, then drop the post's
    /// cached preview without waiting for the cache.
    pub async fn create_comment(
        &self,
        post_id: i64,
        owner_id: i64,
        content: String,
        reply_to: Option<String>,
    ) -> Result<CommentRecord, FeedError> {
        let body = NewCommentBody::parse(content, reply_to, &self.limits)?;
        let owner = self.owner(owner_id).await?;

        let comment = self
            .comments_write
            .create_comment(CreateCommentParams {
                post_id,
                owner_id: owner.id,
                username: owner.username,
                avatar: owner.avatar,
                profile_version: owner.profile_version,
                content: body.content,
                reply_to: body.reply_to,
            })
            .await
            .map_err(|err| match err {
                RepoError::NotFound => FeedError::NotFound("post"),
                other => other.into(),
            })?;

        self.cache.invalidate_post(post_id);

        info!(
            target = "plaza::application::feed",
            post_id,
            comment_id = comment.id,
            owner_id = comment.owner_id,
            "comment created"
        );
        Ok(comment)
    }

    async fn owner(&self, owner_id: i64) -> Result<AccountProfile, FeedError> {
        self.accounts
            .find_account(owner_id)
            .await?
            .ok_or(FeedError::NotFound("account"))
    }

    async fn preview_for(&self, post_id: i64, count: usize) -> Vec<CommentRecord> {
        match self.cache.top_comments(post_id, count).await {
            Ok(comments) => comments,
            Err(err) => {
                warn!(
                    target = "plaza::application::feed",
                    post_id,
                    error = %err,
                    "comment preview unavailable"
                );
                Vec::new()
            }
        }
    }
}
