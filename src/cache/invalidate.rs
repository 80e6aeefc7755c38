//! Detached, bounded cache invalidation.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use metrics::counter;
use tokio::sync::{Notify, Semaphore};
use tracing::{debug, warn};

use super::store::KvStore;

/// Deletes cache keys in background tasks so writers never wait on the cache.
///
/// At most `permits` deletions talk to the backend at once; surplus tasks
/// queue on the semaphore instead of being dropped.
#[derive(Clone)]
pub struct CacheInvalidator {
    store: Arc<dyn KvStore>,
    permits: Arc<Semaphore>,
    in_flight: Arc<AtomicUsize>,
    idle: Arc<Notify>,
    op_timeout: Duration,
}

impl CacheInvalidator {
    pub fn new(store: Arc<dyn KvStore>, permits: usize, op_timeout: Duration) -> Self {
        Self {
            store,
            permits: Arc::new(Semaphore::new(permits.max(1))),
            in_flight: Arc::new(AtomicUsize::new(0)),
            idle: Arc::new(Notify::new()),
            op_timeout,
        }
    }

    /// Schedule deletion of `key` and return immediately.
    pub fn invalidate(&self, key: String) {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let this = self.clone();
        tokio::spawn(async move {
            this.run(key).await;
            if this.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
                this.idle.notify_waiters();
            }
        });
    }

    /// Number of scheduled invalidations that have not finished.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Wait until every scheduled invalidation has finished.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            if self.in_flight() == 0 {
                return;
            }
            notified.await;
        }
    }

    async fn run(&self, key: String) {
        let Ok(_permit) = self.permits.acquire().await else {
            return;
        };

        let result = match tokio::time::timeout(self.op_timeout, self.store.delete(&key)).await {
            Ok(Ok(())) => {
                debug!(target = "plaza::cache::invalidate", key = %key, "cache key invalidated");
                "ok"
            }
            Ok(Err(err)) => {
                warn!(
                    target = "plaza::cache::invalidate",
                    key = %key,
                    error = %err,
                    "cache invalidation failed; entry will expire by TTL"
                );
                "error"
            }
            Err(_) => {
                warn!(
                    target = "plaza::cache::invalidate",
                    key = %key,
                    timeout_ms = self.op_timeout.as_millis() as u64,
                    "cache invalidation timed out; entry will expire by TTL"
                );
                "timeout"
            }
        };
        counter!("plaza_comment_cache_invalidation_total", "result" => result).increment(1);
    }
}
