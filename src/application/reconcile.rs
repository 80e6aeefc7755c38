//! Repairs denormalized feed data out of band.
//!
//! Every pass re-derives its work from the database, so passes are
//! idempotent, may overlap with request traffic, and a skipped pass is
//! covered by the next one.

use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;
use tracing::{info, warn};

use crate::application::repos::{AccountsRepo, OrphanCleanupReport, ReconcileRepo, RepoError};
use crate::cache::CommentCache;

pub const DEFAULT_PROFILE_SYNC_LOOKBACK: Duration = Duration::from_secs(90);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProfileSyncSummary {
    pub accounts: usize,
    pub failed: usize,
    pub posts: u64,
    pub comments: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FullCleanupSummary {
    pub orphans: OrphanCleanupReport,
    pub purged_keys: u64,
}

#[derive(Clone)]
pub struct ReconcileService {
    accounts: Arc<dyn AccountsRepo>,
    repo: Arc<dyn ReconcileRepo>,
    cache: CommentCache,
    lookback: Duration,
}

impl ReconcileService {
    pub fn new(
        accounts: Arc<dyn AccountsRepo>,
        repo: Arc<dyn ReconcileRepo>,
        cache: CommentCache,
    ) -> Self {
        Self {
            accounts,
            repo,
            cache,
            lookback: DEFAULT_PROFILE_SYNC_LOOKBACK,
        }
    }

    pub fn with_lookback(mut self, lookback: Duration) -> Self {
        self.lookback = lookback;
        self
    }

    /// Copy display fields of accounts changed within the lookback window onto
    /// their posts and comments. One account failing does not stop the pass.
    pub async fn sync_profiles(&self, now: OffsetDateTime) -> Result<ProfileSyncSummary, RepoError> {
        let since = now - self.lookback;
        let profiles = self.accounts.list_changed_since(since).await?;

        let mut summary = ProfileSyncSummary {
            accounts: profiles.len(),
            ..ProfileSyncSummary::default()
        };

        for profile in &profiles {
            match self.repo.sync_profile(profile).await {
                Ok(counts) => {
                    summary.posts += counts.posts;
                    summary.comments += counts.comments;
                }
                Err(err) => {
                    summary.failed += 1;
                    warn!(
                        target = "plaza::application::reconcile",
                        account_id = profile.id,
                        profile_version = profile.profile_version,
                        error = %err,
                        "profile sync failed for account"
                    );
                }
            }
        }

        if summary.posts > 0 || summary.comments > 0 || summary.failed > 0 {
            info!(
                target = "plaza::application::reconcile",
                accounts = summary.accounts,
                failed = summary.failed,
                posts = summary.posts,
                comments = summary.comments,
                "profile sync pass finished"
            );
        }
        Ok(summary)
    }

    /// Remove orphaned rows and repair counters. Cached comment lists are
    /// purged when any comment disappeared.
    pub async fn cleanup_orphans(&self) -> Result<OrphanCleanupReport, RepoError> {
        let report = self.run_cleanup().await?;

        if report.comments > 0 {
            if let Err(err) = self.cache.purge_all().await {
                warn!(
                    target = "plaza::application::reconcile",
                    error = %err,
                    "comment cache purge after cleanup failed; entries expire by TTL"
                );
            }
        }
        Ok(report)
    }

    /// Orphan cleanup followed by an unconditional comment cache purge.
    pub async fn full_cleanup(&self) -> Result<FullCleanupSummary, RepoError> {
        let orphans = self.run_cleanup().await?;

        let purged_keys = match self.cache.purge_all().await {
            Ok(count) => count,
            Err(err) => {
                warn!(
                    target = "plaza::application::reconcile",
                    error = %err,
                    "comment cache purge failed; entries expire by TTL"
                );
                0
            }
        };

        info!(
            target = "plaza::application::reconcile",
            removed = orphans.removed_total(),
            repaired_posts = orphans.repaired_posts,
            repaired_comments = orphans.repaired_comments,
            purged_keys,
            "full cleanup finished"
        );
        Ok(FullCleanupSummary {
            orphans,
            purged_keys,
        })
    }

    async fn run_cleanup(&self) -> Result<OrphanCleanupReport, RepoError> {
        let report = self.repo.cleanup_orphans().await?;
        if !report.is_empty() {
            info!(
                target = "plaza::application::reconcile",
                comments = report.comments,
                posts = report.posts,
                post_likes = report.post_likes,
                comment_likes = report.comment_likes,
                repaired_posts = report.repaired_posts,
                repaired_comments = report.repaired_comments,
                "orphan cleanup removed rows"
            );
        }
        Ok(report)
    }
}
