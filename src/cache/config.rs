//! Cache configuration.
//!
//! Resolved from the `[cache]` section of `plaza.toml`.

use std::num::NonZeroUsize;
use std::time::Duration;

const DEFAULT_COMMENTS_TTL_SECS: u64 = 30 * 60;
const DEFAULT_MAX_CACHED_COMMENTS: usize = 20;
const DEFAULT_OP_TIMEOUT_MS: u64 = 200;
const DEFAULT_MAX_INFLIGHT_INVALIDATIONS: usize = 64;
const DEFAULT_MEMORY_CAPACITY: usize = 10_000;

/// Which key-value store backs the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheBackend {
    /// Process-local LRU with per-entry expiry. Suitable for a single node.
    Memory,
    /// Shared Redis instance.
    Redis { url: String },
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    /// Lifetime of a cached comment list.
    pub comments_ttl: Duration,
    /// Number of newest comments stored per post.
    pub max_cached_comments: usize,
    /// Upper bound for a single backend call before it counts as a miss.
    pub op_timeout: Duration,
    /// Concurrent background invalidations; further ones wait for a slot.
    pub max_inflight_invalidations: usize,
    /// Entry ceiling of the in-memory backend.
    pub memory_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::Memory,
            comments_ttl: Duration::from_secs(DEFAULT_COMMENTS_TTL_SECS),
            max_cached_comments: DEFAULT_MAX_CACHED_COMMENTS,
            op_timeout: Duration::from_millis(DEFAULT_OP_TIMEOUT_MS),
            max_inflight_invalidations: DEFAULT_MAX_INFLIGHT_INVALIDATIONS,
            memory_capacity: DEFAULT_MEMORY_CAPACITY,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            backend: settings.backend.clone(),
            comments_ttl: settings.comments_ttl,
            max_cached_comments: settings.max_cached_comments.get(),
            op_timeout: settings.op_timeout,
            max_inflight_invalidations: settings.max_inflight_invalidations.get(),
            memory_capacity: settings.memory_capacity.get(),
        }
    }
}

impl CacheConfig {
    /// Returns the memory capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn memory_capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.memory_capacity).unwrap_or(NonZeroUsize::MIN)
    }

    /// Returns the invalidation bound, clamping to 1 if zero.
    pub fn invalidation_permits(&self) -> usize {
        self.max_inflight_invalidations.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = CacheConfig::default();
        assert_eq!(config.backend, CacheBackend::Memory);
        assert_eq!(config.comments_ttl, Duration::from_secs(1800));
        assert_eq!(config.max_cached_comments, 20);
        assert_eq!(config.op_timeout, Duration::from_millis(200));
        assert_eq!(config.max_inflight_invalidations, 64);
    }

    #[test]
    fn zero_bounds_clamp_to_one() {
        let config = CacheConfig {
            memory_capacity: 0,
            max_inflight_invalidations: 0,
            ..Default::default()
        };
        assert_eq!(config.memory_capacity_non_zero().get(), 1);
        assert_eq!(config.invalidation_permits(), 1);
    }
}
