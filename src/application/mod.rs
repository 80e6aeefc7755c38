//! Application services: feed reads and writes, like toggles, reconciliation.

pub mod error;
pub mod feed;
pub mod jobs;
pub mod likes;
pub mod pagination;
pub mod reconcile;
pub mod repos;

#[cfg(test)]
pub(crate) mod testing;
