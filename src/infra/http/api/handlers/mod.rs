//! Feed API handlers.
//!
//! Extractor rejections are folded into the JSON error envelope here so every
//! failure a client sees has the same shape.

mod comments;
mod posts;

pub use comments::*;
pub use posts::*;

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};

use super::error::ApiError;

pub(crate) fn query_rejection(rejection: QueryRejection) -> ApiError {
    ApiError::bad_request("Invalid query string", Some(rejection.body_text()))
}

pub(crate) fn json_rejection(rejection: JsonRejection) -> ApiError {
    ApiError::bad_request("Invalid request body", Some(rejection.body_text()))
}

pub(crate) fn path_rejection(rejection: PathRejection) -> ApiError {
    ApiError::bad_request("Invalid path parameter", Some(rejection.body_text()))
}
