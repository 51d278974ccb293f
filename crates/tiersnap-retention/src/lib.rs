//! Tiersnap Retention
//!
//! The retention manager keeps four tiers of backups (hourly, daily, monthly
//! and yearly) fresh and bounded. A single [`RetentionManager::manage`] run:
//!
//! 1. creates any missing tier markers
//! 2. refreshes each tier in order, producing a new hourly snapshot or
//!    promoting the newest artifact of the next finer tier when stale
//! 3. prunes every tier down to its configured maximum, oldest first
//!
//! The bucket listing is the only state. Nothing is cached between runs, and
//! the manager assumes at most one run against a bucket at a time.

mod clock;
mod error;
mod manager;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::RetentionError;
pub use manager::{ManageReport, RefreshOutcome, RetentionManager};
