//! Cron-driven reconciliation jobs.
//!
//! Each job is a marker built from the cron tick plus a `process_*` handler
//! that apalis drives through a [`CronStream`](apalis_cron::CronStream).
//! Handlers log failures and return `Ok` so a bad pass never stops the
//! worker; the next tick retries from scratch.

mod context;
mod full_cleanup;
mod orphan_cleanup;
mod profile_sync;

use std::str::FromStr;

use apalis_cron::Schedule;
use thiserror::Error;

pub use context::ReconcileJobContext;
pub use full_cleanup::{DEFAULT_FULL_CLEANUP_CRON, FullCleanupJob, process_full_cleanup_job};
pub use orphan_cleanup::{
    DEFAULT_ORPHAN_CLEANUP_CRON, OrphanCleanupJob, process_orphan_cleanup_job,
};
pub use profile_sync::{DEFAULT_PROFILE_SYNC_CRON, ProfileSyncJob, process_profile_sync_job};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid cron expression `{expression}`: {message}")]
pub struct ScheduleError {
    pub expression: String,
    pub message: String,
}

/// Parse a six-field cron expression (seconds first).
pub fn parse_schedule(expression: &str) -> Result<Schedule, ScheduleError> {
    Schedule::from_str(expression).map_err(|err| ScheduleError {
        expression: expression.to_string(),
        message: err.to_string(),
    })
}
