//! In-process key-value backend.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use lru::LruCache;
use tokio::time::Instant;

use super::config::CacheConfig;
use super::lock::mutex_lock;
use super::store::{CacheError, KvStore};

const SOURCE: &str = "cache::memory";

struct MemoryEntry {
    value: Bytes,
    expires_at: Instant,
}

/// LRU-bounded map with per-entry expiry, for single-node deployments and tests.
///
/// Expired entries are dropped lazily when read or when a prefix sweep
/// passes over them.
pub struct MemoryKvStore {
    entries: Mutex<LruCache<String, MemoryEntry>>,
}

impl MemoryKvStore {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(config.memory_capacity_non_zero())),
        }
    }

    pub fn len(&self) -> usize {
        mutex_lock(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError> {
        let mut entries = mutex_lock(&self.entries, SOURCE, "get");
        let now = Instant::now();
        let expired = match entries.get(key) {
            Some(entry) if entry.expires_at > now => return Ok(Some(entry.value.clone())),
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.pop(key);
        }
        Ok(None)
    }

    async fn set_ex(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), CacheError> {
        let entry = MemoryEntry {
            value,
            expires_at: Instant::now() + ttl,
        };
        mutex_lock(&self.entries, SOURCE, "set_ex").put(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        mutex_lock(&self.entries, SOURCE, "delete").pop(key);
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64, CacheError> {
        let mut entries = mutex_lock(&self.entries, SOURCE, "delete_prefix");
        let now = Instant::now();
        let doomed: Vec<String> = entries
            .iter()
            .filter(|(key, entry)| key.starts_with(prefix) || entry.expires_at <= now)
            .map(|(key, _)| key.clone())
            .collect();

        let mut removed = 0;
        for key in doomed {
            if entries.pop(&key).is_some() && key.starts_with(prefix) {
                removed += 1;
            }
        }
        Ok(removed)
    }
}
