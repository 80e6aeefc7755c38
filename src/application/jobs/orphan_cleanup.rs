//! Hourly removal of rows whose owner or parent disappeared.

use apalis::prelude::*;

use super::context::ReconcileJobContext;

/// Top of every hour.
pub const DEFAULT_ORPHAN_CLEANUP_CRON: &str = "0 0 * * * *";

#[derive(Default, Debug, Clone)]
pub struct OrphanCleanupJob;

impl From<chrono::DateTime<chrono::Utc>> for OrphanCleanupJob {
    fn from(_: chrono::DateTime<chrono::Utc>) -> Self {
        Self
    }
}

pub async fn process_orphan_cleanup_job(
    _job: OrphanCleanupJob,
    ctx: Data<ReconcileJobContext>,
) -> Result<(), apalis::prelude::Error> {
    if let Err(err) = ctx.reconcile.cleanup_orphans().await {
        tracing::warn!(target = "plaza::jobs::orphan_cleanup", error = %err, "Orphan cleanup failed");
    }
    Ok(())
}
