//! Like toggles for posts and comments.
//!
//! Each (target, owner) pair is a two-state machine. The current state is
//! always probed server side; a request for the state already stored is a
//! no-op, and a transition writes the join row and the counter together.

use std::sync::Arc;

use tracing::debug;

use crate::application::feed::FeedError;
use crate::application::repos::{CommentsRepo, LikesRepo, PostsRepo, RepoError};
use crate::domain::types::LikeOutcome;

#[derive(Clone)]
pub struct LikeService {
    posts: Arc<dyn PostsRepo>,
    comments: Arc<dyn CommentsRepo>,
    likes: Arc<dyn LikesRepo>,
}

impl LikeService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        comments: Arc<dyn CommentsRepo>,
        likes: Arc<dyn LikesRepo>,
    ) -> Self {
        Self {
            posts,
            comments,
            likes,
        }
    }

    pub async fn set_post_like(
        &self,
        post_id: i64,
        owner_id: i64,
        liked: bool,
    ) -> Result<LikeOutcome, FeedError> {
        if self.posts.find_post(post_id).await?.is_none() {
            return Err(FeedError::NotFound("post"));
        }

        if self.likes.post_liked(post_id, owner_id).await? == liked {
            return Ok(LikeOutcome::unchanged(liked));
        }

        let changed = self
            .likes
            .apply_post_like(post_id, owner_id, liked)
            .await
            .map_err(|err| not_found_as("post", err))?;

        debug!(
            target = "plaza::application::likes",
            post_id, owner_id, liked, changed, "post like applied"
        );
        Ok(outcome(changed, liked))
    }

    pub async fn set_comment_like(
        &self,
        comment_id: i64,
        owner_id: i64,
        liked: bool,
    ) -> Result<LikeOutcome, FeedError> {
        if self.comments.find_comment(comment_id).await?.is_none() {
            return Err(FeedError::NotFound("comment"));
        }

        if self.likes.comment_liked(comment_id, owner_id).await? == liked {
            return Ok(LikeOutcome::unchanged(liked));
        }

        let changed = self
            .likes
            .apply_comment_like(comment_id, owner_id, liked)
            .await
            .map_err(|err| not_found_as("comment", err))?;

        debug!(
            target = "plaza::application::likes",
            comment_id, owner_id, liked, changed, "comment like applied"
        );
        Ok(outcome(changed, liked))
    }
}

/// A transition that found the row already in place lost a race with an
/// identical request; the stored state is still the requested one.
fn outcome(changed: bool, liked: bool) -> LikeOutcome {
    if changed {
        LikeOutcome::changed(liked)
    } else {
        LikeOutcome::unchanged(liked)
    }
}

fn not_found_as(entity: &'static str, err: RepoError) -> FeedError {
    match err {
        RepoError::NotFound => FeedError::NotFound(entity),
        other => other.into(),
    }
}
