//! Cache key definitions.

/// Prefix shared by every top-comments entry.
pub const COMMENTS_KEY_PREFIX: &str = "feed:comments:";

pub fn comments_key(post_id: i64) -> String {
    format!("{COMMENTS_KEY_PREFIX}{post_id}")
}
