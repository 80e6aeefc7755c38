//! Keyset pagination primitives shared by the post feed and comment lists.
//!
//! A cursor is the id of the last item the client received. Repositories
//! resolve the cursor row's sort key and continue strictly after it in
//! `(primary DESC, id DESC)` order, fetching one extra row to detect whether
//! another page exists.

use serde::Serialize;
use thiserror::Error;

pub const DEFAULT_PAGE_LIMIT: u32 = 20;
pub const MAX_PAGE_LIMIT: u32 = 50;

/// Validated page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: u32,
    pub after_id: Option<i64>,
}

impl PageRequest {
    /// Build a request, defaulting the limit and rejecting values outside `1..=MAX_PAGE_LIMIT`.
    pub fn new(limit: Option<u32>, after_id: Option<i64>) -> Result<Self, PaginationError> {
        let limit = limit.unwrap_or(DEFAULT_PAGE_LIMIT);
        if limit == 0 || limit > MAX_PAGE_LIMIT {
            return Err(PaginationError::InvalidLimit(limit));
        }
        Ok(Self { limit, after_id })
    }

    pub fn first(limit: u32) -> Result<Self, PaginationError> {
        Self::new(Some(limit), None)
    }

    /// Number of rows to request from storage.
    pub fn fetch_limit(&self) -> i64 {
        i64::from(self.limit) + 1
    }
}

/// Cursor-aware page result.
#[derive(Debug, Clone, Serialize)]
pub struct CursorPage<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<i64>,
    pub has_more: bool,
}

impl<T> CursorPage<T> {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            next_cursor: None,
            has_more: false,
        }
    }

    /// Trim a `limit + 1` fetch down to `limit` rows and derive the next cursor.
    pub fn from_overfetch(mut rows: Vec<T>, limit: u32, id_of: impl Fn(&T) -> i64) -> Self {
        let limit = limit as usize;
        let has_more = rows.len() > limit;
        if has_more {
            rows.truncate(limit);
        }
        let next_cursor = if has_more {
            rows.last().map(&id_of)
        } else {
            None
        };
        Self {
            items: rows,
            next_cursor,
            has_more,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> CursorPage<U> {
        CursorPage {
            items: self.items.into_iter().map(f).collect(),
            next_cursor: self.next_cursor,
            has_more: self.has_more,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PaginationError {
    #[error("limit {0} is outside 1..={max}", max = MAX_PAGE_LIMIT)]
    InvalidLimit(u32),
    #[error("invalid cursor: no item with id {0} in this listing")]
    InvalidCursor(i64),
}
