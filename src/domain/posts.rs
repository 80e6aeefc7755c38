//! Validation of user-supplied post and comment bodies.

use url::Url;

use super::error::DomainError;

pub const DEFAULT_POST_CONTENT_MAX_CHARS: usize = 2000;
pub const DEFAULT_IMAGE_URL_MAX_CHARS: usize = 500;
pub const DEFAULT_COMMENT_CONTENT_MAX_CHARS: usize = 500;
pub const DEFAULT_REPLY_TO_MAX_CHARS: usize = 100;

/// Upper bounds on user-supplied text, measured in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentLimits {
    pub post_content_max: usize,
    pub image_url_max: usize,
    pub comment_content_max: usize,
    pub reply_to_max: usize,
}

impl Default for ContentLimits {
    fn default() -> Self {
        Self {
            post_content_max: DEFAULT_POST_CONTENT_MAX_CHARS,
            image_url_max: DEFAULT_IMAGE_URL_MAX_CHARS,
            comment_content_max: DEFAULT_COMMENT_CONTENT_MAX_CHARS,
            reply_to_max: DEFAULT_REPLY_TO_MAX_CHARS,
        }
    }
}

/// A validated post body: at least one of `content` and `image_url` is present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPostBody {
    pub content: Option<String>,
    pub image_url: Option<String>,
}

impl NewPostBody {
    pub fn parse(
        content: Option<String>,
        image_url: Option<String>,
        limits: &ContentLimits,
    ) -> Result<Self, DomainError> {
        let content = non_blank(content);
        let image_url = non_blank(image_url);

        if content.is_none() && image_url.is_none() {
            return Err(DomainError::validation(
                "post requires text content or an image",
            ));
        }

        if let Some(text) = content.as_deref() {
            ensure_max_chars(text, limits.post_content_max, "content")?;
        }

        if let Some(raw) = image_url.as_deref() {
            ensure_max_chars(raw, limits.image_url_max, "image_url")?;
            let parsed = Url::parse(raw)
                .map_err(|err| DomainError::validation(format!("image_url is not a URL: {err}")))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(DomainError::validation(
                    "image_url must use the http or https scheme",
                ));
            }
        }

        Ok(Self { content, image_url })
    }
}

/// A validated comment body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCommentBody {
    pub content: String,
    pub reply_to: Option<String>,
}

impl NewCommentBody {
    pub fn parse(
        content: String,
        reply_to: Option<String>,
        limits: &ContentLimits,
    ) -> Result<Self, DomainError> {
        let content = non_blank(Some(content))
            .ok_or_else(|| DomainError::validation("comment content must not be empty"))?;
        ensure_max_chars(&content, limits.comment_content_max, "content")?;

        let reply_to = non_blank(reply_to);
        if let Some(name) = reply_to.as_deref() {
            ensure_max_chars(name, limits.reply_to_max, "reply_to")?;
        }

        Ok(Self { content, reply_to })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|raw| {
        let trimmed = raw.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn ensure_max_chars(value: &str, max: usize, field: &str) -> Result<(), DomainError> {
    let count = value.chars().count();
    if count > max {
        return Err(DomainError::validation(format!(
            "{field} exceeds {max} characters (got {count})"
        )));
    }
    Ok(())
}
