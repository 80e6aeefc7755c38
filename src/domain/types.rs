//! Shared domain enumerations.

use std::fmt;

use plaza_api_types::FeedSort;

/// Primary ordering key of the post feed. Every mode breaks ties on `id DESC`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SortMode {
    #[default]
    Time,
    Like,
    Comment,
}

impl SortMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortMode::Time => "time",
            SortMode::Like => "like",
            SortMode::Comment => "comment",
        }
    }
}

impl fmt::Display for SortMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<FeedSort> for SortMode {
    fn from(value: FeedSort) -> Self {
        match value {
            FeedSort::Time => SortMode::Time,
            FeedSort::Like => SortMode::Like,
            FeedSort::Comment => SortMode::Comment,
        }
    }
}

/// Result of a like toggle request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LikeOutcome {
    /// Whether this request changed the stored state.
    pub changed: bool,
    /// State after the request.
    pub is_liked: bool,
}

impl LikeOutcome {
    pub fn unchanged(is_liked: bool) -> Self {
        Self {
            changed: false,
            is_liked,
        }
    }

    pub fn changed(is_liked: bool) -> Self {
        Self {
            changed: true,
            is_liked,
        }
    }
}
