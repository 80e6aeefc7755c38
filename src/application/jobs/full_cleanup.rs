//! Nightly orphan sweep followed by a full comment cache purge.

use apalis::prelude::*;

use super::context::ReconcileJobContext;

/// 02:00:00 every day.
pub const DEFAULT_FULL_CLEANUP_CRON: &str = "0 0 2 * * *";

#[derive(Default, Debug, Clone)]
pub struct FullCleanupJob;

impl From<chrono::DateTime<chrono::Utc>> for FullCleanupJob {
    fn from(_: chrono::DateTime<chrono::Utc>) -> Self {
        Self
    }
}

pub async fn process_full_cleanup_job(
    _job: FullCleanupJob,
    ctx: Data<ReconcileJobContext>,
) -> Result<(), apalis::prelude::Error> {
    if let Err(err) = ctx.reconcile.full_cleanup().await {
        tracing::warn!(target = "plaza::jobs::full_cleanup", error = %err, "Full cleanup failed");
    }
    Ok(())
}
