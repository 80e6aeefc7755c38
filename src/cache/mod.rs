//! Comment cache.
//!
//! Keeps the newest comments of each post in a key-value store so feed pages
//! can embed a comment preview without a query per post.
//!
//! - Keys are `feed:comments:<post id>`; values are JSON arrays, newest first.
//! - Entries expire after a TTL and are deleted after every new comment.
//! - A fill that overlaps an invalidation of its post is served but not stored.
//! - Backend failures never reach callers; they degrade to a cache miss.
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! backend = "redis"            # or "memory"
//! redis_url = "redis://127.0.0.1:6379"
//! comments_ttl_seconds = 1800
//! max_cached_comments = 20
//! ```

mod comments;
mod config;
mod invalidate;
mod keys;
mod lock;
mod memory;
mod store;

pub use comments::CommentCache;
pub use config::{CacheBackend, CacheConfig};
pub use invalidate::CacheInvalidator;
pub use keys::{COMMENTS_KEY_PREFIX, comments_key};
pub use memory::MemoryKvStore;
pub use store::{CacheError, KvStore};
