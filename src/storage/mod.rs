//! Durable tracking state.
//!
//! Three record families, all keyed for idempotent upsert:
//! - per-owner tracked URL collections (`tracked/{owner}.json`)
//! - schedule entries (`schedules.json`)
//! - the authorization allow list (`allowlist.json`)
//!
//! Every mutating operation is atomic with respect to one owner (or the
//! schedule/allow-list file): implementations read-modify-write the
//! specific entry under a scoped lock, so a scheduled cycle and a user
//! command racing on the same owner cannot clobber each other, and two
//! cycles for different URLs never lose each other's commits.

pub mod local;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{AllowList, FileRef, ScheduleEntry, TrackedUrl};

// Re-export for convenience
pub use local::JsonStore;

/// Trait for tracking state backends.
#[async_trait]
pub trait TrackingStore: Send + Sync {
    /// All URLs tracked by an owner.
    async fn list_tracked(&self, owner_id: &str) -> Result<Vec<TrackedUrl>>;

    /// One tracked URL, if present.
    async fn get_tracked(&self, owner_id: &str, url: &str) -> Result<Option<TrackedUrl>>;

    /// Add a tracked URL. Fails with a tracking error on a duplicate
    /// owner+URL pair.
    async fn insert_tracked(&self, tracked: TrackedUrl) -> Result<()>;

    /// Remove a tracked URL, returning it. Fails with a tracking error
    /// if the URL was not tracked.
    async fn remove_tracked(&self, owner_id: &str, url: &str) -> Result<TrackedUrl>;

    /// Commit the result of one check cycle: store the given hash, merge
    /// the delivered files into the stored set, and stamp the check time,
    /// in one read-modify-write of that single entry. Called once per
    /// cycle after all deliveries were attempted, never per file. The
    /// caller passes the old hash back when a partial failure means the
    /// cycle was not fully processed.
    async fn commit_check(
        &self,
        owner_id: &str,
        url: &str,
        hash: Option<String>,
        delivered: Vec<FileRef>,
        checked_at: DateTime<Utc>,
    ) -> Result<()>;

    /// Record that an unchanged check completed. Never touches hash or
    /// files.
    async fn touch_checked(
        &self,
        owner_id: &str,
        url: &str,
        checked_at: DateTime<Utc>,
    ) -> Result<()>;

    /// All persisted schedule entries.
    async fn load_schedules(&self) -> Result<Vec<ScheduleEntry>>;

    /// Insert or replace a schedule entry by its stable ID.
    async fn upsert_schedule(&self, entry: ScheduleEntry) -> Result<()>;

    /// Remove a schedule entry. Removing an unknown ID is a no-op.
    async fn remove_schedule(&self, schedule_id: &str) -> Result<()>;

    /// Load the authorization allow list.
    async fn load_allowlist(&self) -> Result<AllowList>;

    /// Replace the authorization allow list.
    async fn save_allowlist(&self, list: AllowList) -> Result<()>;
}
