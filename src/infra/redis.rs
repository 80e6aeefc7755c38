//! Redis-backed [`KvStore`].

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use redis::aio::ConnectionManager;
use tracing::debug;

use crate::cache::{CacheError, KvStore};

const SCAN_BATCH: u32 = 100;

#[derive(Clone)]
pub struct RedisKvStore {
    conn: ConnectionManager,
}

impl RedisKvStore {
    /// Open a managed connection; reconnects are handled by the manager.
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(url).map_err(CacheError::backend)?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(CacheError::backend)?;
        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<(), CacheError> {
        redis::cmd("PING")
            .query_async::<_, String>(&mut self.conn.clone())
            .await
            .map(|_| ())
            .map_err(CacheError::backend)
    }
}

#[async_trait]
impl KvStore for RedisKvStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError> {
        let value: Option<Vec<u8>> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut self.conn.clone())
            .await
            .map_err(CacheError::backend)?;
        Ok(value.map(Bytes::from))
    }

    async fn set_ex(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), CacheError> {
        let seconds = ttl.as_secs().max(1);
        redis::cmd("SETEX")
            .arg(key)
            .arg(seconds)
            .arg(value.as_ref())
            .query_async::<_, ()>(&mut self.conn.clone())
            .await
            .map_err(CacheError::backend)
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        redis::cmd("DEL")
            .arg(key)
            .query_async::<_, i64>(&mut self.conn.clone())
            .await
            .map(|_| ())
            .map_err(CacheError::backend)
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64, CacheError> {
        let pattern = format!("{prefix}*");
        let mut cursor: u64 = 0;
        let mut removed: u64 = 0;

        loop {
            let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut self.conn.clone())
                .await
                .map_err(CacheError::backend)?;

            if !keys.is_empty() {
                let deleted: i64 = redis::cmd("DEL")
                    .arg(&keys)
                    .query_async(&mut self.conn.clone())
                    .await
                    .map_err(CacheError::backend)?;
                removed += u64::try_from(deleted).unwrap_or(0);
            }

            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }

        debug!(target = "plaza::infra::redis", pattern = %pattern, removed, "deleted keys by prefix");
        Ok(removed)
    }
}
