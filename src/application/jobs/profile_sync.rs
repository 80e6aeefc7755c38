//! Propagates renamed accounts onto their posts and comments.

use apalis::prelude::*;
use time::OffsetDateTime;

use super::context::ReconcileJobContext;

/// Every 30 seconds.
pub const DEFAULT_PROFILE_SYNC_CRON: &str = "*/30 * * * * *";

#[derive(Default, Debug, Clone)]
pub struct ProfileSyncJob;

impl From<chrono::DateTime<chrono::Utc>> for ProfileSyncJob {
    fn from(_: chrono::DateTime<chrono::Utc>) -> Self {
        Self
    }
}

pub async fn process_profile_sync_job(
    _job: ProfileSyncJob,
    ctx: Data<ReconcileJobContext>,
) -> Result<(), apalis::prelude::Error> {
    match ctx.reconcile.sync_profiles(OffsetDateTime::now_utc()).await {
        Ok(summary) if summary.posts + summary.comments > 0 => {
            tracing::info!(
                target = "plaza::jobs::profile_sync",
                accounts = summary.accounts,
                posts = summary.posts,
                comments = summary.comments,
                "Synced profile fields"
            );
        }
        Err(err) => {
            tracing::warn!(target = "plaza::jobs::profile_sync", error = %err, "Profile sync failed");
        }
        _ => {}
    }
    Ok(())
}
