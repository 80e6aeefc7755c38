//! JSON feed API.

pub mod error;
pub mod handlers;
pub mod identity;
pub mod models;
pub mod state;

pub use identity::Viewer;
pub use state::ApiState;

use axum::{
    Router,
    routing::{get, post},
};

use crate::infra::http::RouterState;

pub fn build_api_router() -> Router<RouterState> {
    Router::new()
        .route(
            "/feed/posts",
            get(handlers::list_posts).post(handlers::create_post),
        )
        .route("/feed/posts/{id}", get(handlers::get_post))
        .route("/feed/posts/{id}/like", post(handlers::like_post))
        .route(
            "/feed/posts/{id}/comments",
            get(handlers::list_comments).post(handlers::create_comment),
        )
        .route("/feed/comments/{id}/like", post(handlers::like_comment))
}
