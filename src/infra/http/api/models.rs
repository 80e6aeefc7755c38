//! Conversions from domain records to wire types.

use plaza_api_types::{
    CommentListResponse, CommentView, LikeResponse, PostListResponse, PostView,
};

use crate::application::feed::{CommentThreadPage, FeedItem};
use crate::application::pagination::CursorPage;
use crate::domain::entities::{CommentRecord, PostRecord};
use crate::domain::types::LikeOutcome;

pub fn comment_to_api(comment: CommentRecord) -> CommentView {
    CommentView {
        id: comment.id,
        post_id: comment.post_id,
        owner_id: comment.owner_id,
        username: comment.username,
        avatar: comment.avatar,
        content: comment.content,
        reply_to: comment.reply_to,
        like_count: comment.like_count,
        created_at: comment.created_at,
    }
}

pub fn post_to_api(post: PostRecord, preview: Vec<CommentRecord>) -> PostView {
    PostView {
        id: post.id,
        owner_id: post.owner_id,
        username: post.username,
        avatar: post.avatar,
        status: post.status,
        content: post.content,
        image_url: post.image_url,
        like_count: post.like_count,
        comment_count: post.comment_count,
        created_at: post.created_at,
        updated_at: post.updated_at,
        preloaded_comments: preview.into_iter().map(comment_to_api).collect(),
    }
}

pub fn post_list_to_api(page: CursorPage<FeedItem>) -> PostListResponse {
    PostListResponse {
        posts: page
            .items
            .into_iter()
            .map(|item| post_to_api(item.post, item.preview))
            .collect(),
        next_cursor: page.next_cursor,
        has_more: page.has_more,
    }
}

pub fn comment_list_to_api(thread: CommentThreadPage) -> CommentListResponse {
    CommentListResponse {
        comments: thread
            .page
            .items
            .into_iter()
            .map(comment_to_api)
            .collect(),
        next_cursor: thread.page.next_cursor,
        has_more: thread.page.has_more,
        total: thread.total,
    }
}

pub fn like_to_api(outcome: LikeOutcome) -> LikeResponse {
    LikeResponse {
        changed: outcome.changed,
        is_liked: outcome.is_liked,
    }
}
