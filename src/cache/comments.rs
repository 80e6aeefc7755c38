//! Read-through cache of the newest comments per post.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use metrics::counter;
use tracing::{debug, warn};

use crate::application::repos::{CommentsRepo, RepoError};
use crate::domain::entities::CommentRecord;

use super::config::CacheConfig;
use super::invalidate::CacheInvalidator;
use super::keys::{COMMENTS_KEY_PREFIX, comments_key};
use super::store::{CacheError, KvStore};

const TARGET: &str = "plaza::cache::comments";
const GENERATION_STRIPES: usize = 256;

/// Invalidation counters striped by post id. A fill is only written back when
/// no invalidation of its stripe happened while it was reading the store.
struct Generations {
    stripes: [AtomicU64; GENERATION_STRIPES],
}

impl Generations {
    fn new() -> Self {
        Self {
            stripes: std::array::from_fn(|_| AtomicU64::new(0)),
        }
    }

    fn slot(&self, post_id: i64) -> &AtomicU64 {
        let index = post_id.rem_euclid(GENERATION_STRIPES as i64) as usize;
        &self.stripes[index]
    }

    fn current(&self, post_id: i64) -> u64 {
        self.slot(post_id).load(Ordering::Acquire)
    }

    fn bump(&self, post_id: i64) {
        self.slot(post_id).fetch_add(1, Ordering::AcqRel);
    }

    fn bump_all(&self) {
        for stripe in &self.stripes {
            stripe.fetch_add(1, Ordering::AcqRel);
        }
    }
}

/// Serves `top_comments` from the key-value store, falling back to the
/// comments repository on any miss or backend failure.
#[derive(Clone)]
pub struct CommentCache {
    store: Arc<dyn KvStore>,
    comments: Arc<dyn CommentsRepo>,
    invalidator: CacheInvalidator,
    generations: Arc<Generations>,
    config: CacheConfig,
}

impl CommentCache {
    pub fn new(store: Arc<dyn KvStore>, comments: Arc<dyn CommentsRepo>, config: CacheConfig) -> Self {
        let invalidator = CacheInvalidator::new(
            store.clone(),
            config.invalidation_permits(),
            config.op_timeout,
        );
        Self {
            store,
            comments,
            invalidator,
            generations: Arc::new(Generations::new()),
            config,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Up to `count` newest comments of `post_id`, newest first.
    ///
    /// `count` is capped at the configured number of cached comments. Only
    /// repository failures are returned; cache failures count as misses.
    pub async fn top_comments(
        &self,
        post_id: i64,
        count: usize,
    ) -> Result<Vec<CommentRecord>, RepoError> {
        let count = count.min(self.config.max_cached_comments);
        if count == 0 {
            return Ok(Vec::new());
        }

        let key = comments_key(post_id);
        if let Some(mut cached) = self.read(&key).await {
            counter!("plaza_comment_cache_hit_total").increment(1);
            cached.truncate(count);
            return Ok(cached);
        }
        counter!("plaza_comment_cache_miss_total").increment(1);

        let limit = u32::try_from(self.config.max_cached_comments).unwrap_or(u32::MAX);
        let generation = self.generations.current(post_id);
        let mut fresh = self.comments.latest_comments(post_id, limit).await?;
        if self.generations.current(post_id) == generation {
            self.write(&key, &fresh).await;
            // The invalidation's delete may have run before our write landed.
            if self.generations.current(post_id) != generation {
                self.discard(&key).await;
            }
        } else {
            debug!(target = TARGET, post_id, "skipping fill raced by invalidation");
            counter!("plaza_comment_cache_stale_fill_total").increment(1);
        }
        fresh.truncate(count);
        Ok(fresh)
    }

    /// Drop the cached list of `post_id` in the background. Fills already in
    /// flight for the post are not written back.
    pub fn invalidate_post(&self, post_id: i64) {
        self.generations.bump(post_id);
        self.invalidator.invalidate(comments_key(post_id));
    }

    /// Remove every cached comment list. Used by reconciliation jobs.
    pub async fn purge_all(&self) -> Result<u64, CacheError> {
        self.generations.bump_all();
        let removed = self.store.delete_prefix(COMMENTS_KEY_PREFIX).await?;
        debug!(target = TARGET, removed, "purged comment cache");
        Ok(removed)
    }

    /// Wait for outstanding background invalidations.
    pub async fn wait_idle(&self) {
        self.invalidator.wait_idle().await;
    }

    async fn read(&self, key: &str) -> Option<Vec<CommentRecord>> {
        let bytes = match tokio::time::timeout(self.config.op_timeout, self.store.get(key)).await {
            Ok(Ok(Some(bytes))) => bytes,
            Ok(Ok(None)) => return None,
            Ok(Err(err)) => {
                self.record_backend_failure("get", key, &err);
                return None;
            }
            Err(_) => {
                self.record_backend_failure("get", key, &CacheError::Timeout(self.config.op_timeout));
                return None;
            }
        };

        match serde_json::from_slice::<Vec<CommentRecord>>(&bytes) {
            Ok(comments) => Some(comments),
            Err(err) => {
                warn!(target = TARGET, key, error = %err, "discarding undecodable cache entry");
                counter!("plaza_comment_cache_error_total", "op" => "decode").increment(1);
                None
            }
        }
    }

    async fn write(&self, key: &str, comments: &[CommentRecord]) {
        let payload = match serde_json::to_vec(comments) {
            Ok(payload) => Bytes::from(payload),
            Err(err) => {
                warn!(target = TARGET, key, error = %err, "comment list not cacheable");
                counter!("plaza_comment_cache_error_total", "op" => "encode").increment(1);
                return;
            }
        };

        let ttl = self.config.comments_ttl;
        match tokio::time::timeout(self.config.op_timeout, self.store.set_ex(key, payload, ttl)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => self.record_backend_failure("set", key, &err),
            Err(_) => {
                self.record_backend_failure("set", key, &CacheError::Timeout(self.config.op_timeout))
            }
        }
    }

    async fn discard(&self, key: &str) {
        match tokio::time::timeout(self.config.op_timeout, self.store.delete(key)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => self.record_backend_failure("delete", key, &err),
            Err(_) => self.record_backend_failure(
                "delete",
                key,
                &CacheError::Timeout(self.config.op_timeout),
            ),
        }
    }

    fn record_backend_failure(&self, op: &'static str, key: &str, err: &CacheError) {
        warn!(target = TARGET, op, key, error = %err, "cache backend unavailable; using store");
        counter!("plaza_comment_cache_error_total", "op" => op).increment(1);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use time::{Duration as TimeDuration, OffsetDateTime};
    use tokio::sync::{Mutex, Notify};

    use super::*;
    use crate::application::pagination::{CursorPage, PageRequest};
    use crate::cache::MemoryKvStore;

    #[derive(Default)]
    struct FakeComments {
        by_post: Mutex<HashMap<i64, Vec<CommentRecord>>>,
        latest_calls: AtomicUsize,
    }

    impl FakeComments {
        async fn push(&self, post_id: i64, id: i64) {
            let base = OffsetDateTime::UNIX_EPOCH + TimeDuration::days(20_000);
            let record = CommentRecord {
                id,
                post_id,
                owner_id: 1,
                username: "ada".into(),
                avatar: String::new(),
                content: format!("comment {id}"),
                reply_to: None,
                like_count: 0,
                profile_version: 1,
                created_at: base + TimeDuration::seconds(id),
                updated_at: base + TimeDuration::seconds(id),
            };
            self.by_post.lock().await.entry(post_id).or_default().push(record);
        }
    }

    #[async_trait]
    impl CommentsRepo for FakeComments {
        async fn find_comment(&self, _id: i64) -> Result<Option<CommentRecord>, RepoError> {
            Ok(None)
        }

        async fn list_comments(
            &self,
            _post_id: i64,
            _page: PageRequest,
        ) -> Result<CursorPage<CommentRecord>, RepoError> {
            Ok(CursorPage::empty())
        }

        async fn count_comments(&self, post_id: i64) -> Result<i64, RepoError> {
            Ok(self.by_post.lock().await.get(&post_id).map_or(0, |c| c.len() as i64))
        }

        async fn latest_comments(
            &self,
            post_id: i64,
            limit: u32,
        ) -> Result<Vec<CommentRecord>, RepoError> {
            self.latest_calls.fetch_add(1, Ordering::SeqCst);
            let mut comments = self
                .by_post
                .lock()
                .await
                .get(&post_id)
                .cloned()
                .unwrap_or_default();
            comments.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
            comments.truncate(limit as usize);
            Ok(comments)
        }
    }

    /// Reads its snapshot, then holds the result until released.
    #[derive(Default)]
    struct GatedComments {
        inner: FakeComments,
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl CommentsRepo for GatedComments {
        async fn find_comment(&self, id: i64) -> Result<Option<CommentRecord>, RepoError> {
            self.inner.find_comment(id).await
        }

        async fn list_comments(
            &self,
            post_id: i64,
            page: PageRequest,
        ) -> Result<CursorPage<CommentRecord>, RepoError> {
            self.inner.list_comments(post_id, page).await
        }

        async fn count_comments(&self, post_id: i64) -> Result<i64, RepoError> {
            self.inner.count_comments(post_id).await
        }

        async fn latest_comments(
            &self,
            post_id: i64,
            limit: u32,
        ) -> Result<Vec<CommentRecord>, RepoError> {
            let snapshot = self.inner.latest_comments(post_id, limit).await;
            self.entered.notify_one();
            self.release.notified().await;
            snapshot
        }
    }

    struct BrokenStore;

    #[async_trait]
    impl KvStore for BrokenStore {
        async fn get(&self, _key: &str) -> Result<Option<Bytes>, CacheError> {
            Err(CacheError::backend("connection refused"))
        }

        async fn set_ex(&self, _key: &str, _value: Bytes, _ttl: Duration) -> Result<(), CacheError> {
            Err(CacheError::backend("connection refused"))
        }

        async fn delete(&self, _key: &str) -> Result<(), CacheError> {
            Err(CacheError::backend("connection refused"))
        }

        async fn delete_prefix(&self, _prefix: &str) -> Result<u64, CacheError> {
            Err(CacheError::backend("connection refused"))
        }
    }

    fn memory_cache(comments: Arc<FakeComments>) -> CommentCache {
        let config = CacheConfig::default();
        let store: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new(&config));
        CommentCache::new(store, comments, config)
    }

    #[tokio::test]
    async fn warm_read_matches_cold_read() {
        let comments = Arc::new(FakeComments::default());
        for id in 1..=25 {
            comments.push(7, id).await;
        }
        let cache = memory_cache(comments.clone());

        let cold = cache.top_comments(7, 5).await.unwrap();
        let warm = cache.top_comments(7, 5).await.unwrap();

        assert_eq!(cold, warm);
        assert_eq!(cold.iter().map(|c| c.id).collect::<Vec<_>>(), vec![25, 24, 23, 22, 21]);
        assert_eq!(comments.latest_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn count_is_capped_by_cached_window() {
        let comments = Arc::new(FakeComments::default());
        for id in 1..=30 {
            comments.push(3, id).await;
        }
        let cache = memory_cache(comments);

        let top = cache.top_comments(3, 100).await.unwrap();
        assert_eq!(top.len(), 20);
        assert!(cache.top_comments(3, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalidation_exposes_new_comment() {
        let comments = Arc::new(FakeComments::default());
        comments.push(1, 1).await;
        let cache = memory_cache(comments.clone());
        assert_eq!(cache.top_comments(1, 20).await.unwrap().len(), 1);

        comments.push(1, 2).await;
        cache.invalidate_post(1);
        cache.wait_idle().await;

        let top = cache.top_comments(1, 20).await.unwrap();
        assert_eq!(top.first().map(|c| c.id), Some(2));
        assert_eq!(top.len(), 2);
    }

    #[tokio::test]
    async fn fill_overlapping_an_invalidation_is_not_cached() {
        let comments = Arc::new(GatedComments::default());
        comments.inner.push(5, 1).await;
        let config = CacheConfig::default();
        let store = Arc::new(MemoryKvStore::new(&config));
        let cache = CommentCache::new(store.clone(), comments.clone(), config);

        let reader = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.top_comments(5, 20).await })
        };
        comments.entered.notified().await;

        // A comment commits and invalidates while the fill holds its snapshot.
        comments.inner.push(5, 2).await;
        cache.invalidate_post(5);
        cache.wait_idle().await;
        comments.release.notify_one();

        let served = reader.await.unwrap().unwrap();
        assert_eq!(served.len(), 1);
        assert!(store.get(&comments_key(5)).await.unwrap().is_none());

        comments.release.notify_one();
        let top = cache.top_comments(5, 20).await.unwrap();
        assert_eq!(top.iter().map(|c| c.id).collect::<Vec<_>>(), vec![2, 1]);
    }

    #[test]
    fn generations_are_striped_by_post() {
        let generations = Generations::new();
        generations.bump(3);
        assert_eq!(generations.current(3), 1);
        assert_eq!(generations.current(4), 0);
        assert_eq!(generations.current(3 + GENERATION_STRIPES as i64), 1);
        assert_eq!(generations.current(-3), 0);

        generations.bump_all();
        assert_eq!((generations.current(3), generations.current(4)), (2, 1));
    }

    #[tokio::test]
    async fn broken_backend_falls_through_to_store() {
        let comments = Arc::new(FakeComments::default());
        comments.push(9, 1).await;
        comments.push(9, 2).await;
        let cache = CommentCache::new(Arc::new(BrokenStore), comments.clone(), CacheConfig::default());

        let top = cache.top_comments(9, 20).await.unwrap();
        assert_eq!(top.len(), 2);
        cache.invalidate_post(9);
        cache.wait_idle().await;
        assert!(cache.purge_all().await.is_err());
    }

    #[tokio::test]
    async fn corrupt_entry_is_treated_as_miss() {
        let comments = Arc::new(FakeComments::default());
        comments.push(4, 1).await;
        let config = CacheConfig::default();
        let store = Arc::new(MemoryKvStore::new(&config));
        store
            .set_ex(&comments_key(4), Bytes::from_static(b"{not json"), Duration::from_secs(60))
            .await
            .unwrap();
        let cache = CommentCache::new(store, comments, config);

        let top = cache.top_comments(4, 20).await.unwrap();
        assert_eq!(top.len(), 1);
    }
}
