//! Caller identity forwarded by the gateway.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use super::error::ApiError;
use crate::infra::http::VIEWER_HEADER;

/// Authenticated account id taken from the `x-user-id` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewer(pub i64);

impl<S> FromRequestParts<S> for Viewer
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(VIEWER_HEADER)
            .ok_or_else(|| ApiError::unauthorized(Some(format!("missing `{VIEWER_HEADER}` header"))))?;

        raw.to_str()
            .ok()
            .and_then(|value| value.trim().parse::<i64>().ok())
            .filter(|id| *id > 0)
            .map(Viewer)
            .ok_or_else(|| {
                ApiError::unauthorized(Some(format!("`{VIEWER_HEADER}` must be a positive integer")))
            })
    }
}

#[cfg(test)]
mod tests {
    use axum::http::{Request, StatusCode};

    use super::*;

    async fn extract(header: Option<&str>) -> Result<Viewer, ApiError> {
        let mut builder = Request::builder().uri("/feed/posts");
        if let Some(value) = header {
            builder = builder.header(VIEWER_HEADER, value);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        Viewer::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn parses_positive_ids() {
        assert_eq!(extract(Some("42")).await.unwrap(), Viewer(42));
    }

    #[tokio::test]
    async fn rejects_missing_and_malformed_headers() {
        for header in [None, Some(""), Some("abc"), Some("0"), Some("-3")] {
            let err = extract(header).await.unwrap_err();
            assert_eq!(err.status(), StatusCode::UNAUTHORIZED, "{header:?}");
        }
    }
}
