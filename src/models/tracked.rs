//! Tracked URL state and schedule entries.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{AppError, Result};
use crate::models::FileRef;

/// Derive the stable schedule key for an owner+URL pair.
///
/// Re-tracking the same URL yields the same key, so schedule upserts
/// replace rather than duplicate.
pub fn schedule_id(owner_id: &str, url: &str) -> String {
    let digest = Sha256::digest(url.as_bytes());
    format!("{}_{}", owner_id, &hex::encode(digest)[..16])
}

/// One watched page owned by a single user/channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackedUrl {
    /// Page URL being watched
    pub url: String,

    /// Owning user/channel ID
    pub owner_id: String,

    /// Content fingerprint of the last successfully processed cycle
    #[serde(default)]
    pub hash: Option<String>,

    /// Files known as of the last successfully processed cycle.
    /// Invariant: URLs are unique within this set.
    #[serde(default)]
    pub files: Vec<FileRef>,

    /// Re-check interval in minutes
    pub interval_minutes: u64,

    /// Suppress fires outside the configured active-hour window
    #[serde(default)]
    pub night_mode: bool,

    /// Timestamp of the last completed check (including unchanged ones)
    #[serde(default)]
    pub last_checked_at: Option<DateTime<Utc>>,

    /// Stable schedule key derived from owner+URL
    pub schedule_id: String,
}

impl TrackedUrl {
    pub fn new(
        owner_id: impl Into<String>,
        url: impl Into<String>,
        interval_minutes: u64,
        night_mode: bool,
    ) -> Self {
        let owner_id = owner_id.into();
        let url = url.into();
        let schedule_id = schedule_id(&owner_id, &url);
        Self {
            url,
            owner_id,
            hash: None,
            files: Vec::new(),
            interval_minutes,
            night_mode,
            last_checked_at: None,
            schedule_id,
        }
    }

    pub fn has_file(&self, url: &str) -> bool {
        self.files.iter().any(|f| f.url == url)
    }

    /// Merge delivered files into the known set, preserving URL uniqueness.
    pub fn merge_files(&mut self, delivered: Vec<FileRef>) {
        for file in delivered {
            if !self.has_file(&file.url) {
                self.files.push(file);
            }
        }
    }
}

/// Per-owner collection of tracked URLs, keyed by URL.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OwnerRecord {
    pub owner_id: String,

    #[serde(default)]
    pub tracked: Vec<TrackedUrl>,
}

impl OwnerRecord {
    pub fn new(owner_id: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            tracked: Vec::new(),
        }
    }

    pub fn find(&self, url: &str) -> Option<&TrackedUrl> {
        self.tracked.iter().find(|t| t.url == url)
    }

    pub fn find_mut(&mut self, url: &str) -> Option<&mut TrackedUrl> {
        self.tracked.iter_mut().find(|t| t.url == url)
    }

    /// Insert a new tracked URL; one entry per URL per owner.
    pub fn insert(&mut self, tracked: TrackedUrl) -> Result<()> {
        if self.find(&tracked.url).is_some() {
            return Err(AppError::tracking(format!(
                "{} is already tracked by {}",
                tracked.url, self.owner_id
            )));
        }
        self.tracked.push(tracked);
        Ok(())
    }

    pub fn remove(&mut self, url: &str) -> Option<TrackedUrl> {
        let idx = self.tracked.iter().position(|t| t.url == url)?;
        Some(self.tracked.remove(idx))
    }
}

/// A persisted schedule entry driving periodic checks for one tracked URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub schedule_id: String,
    pub owner_id: String,
    pub url: String,
    pub interval_minutes: u64,
    pub night_mode: bool,

    /// Next due time; advances by the base interval on every fire,
    /// including suppressed ones.
    pub next_run_at: DateTime<Utc>,

    /// Late fires beyond this grace window coalesce into one catch-up run
    pub misfire_grace_secs: u64,
}

impl ScheduleEntry {
    /// Build the schedule entry for a tracked URL. The first fire is one
    /// interval after `now`; the immediate at-track-time check runs
    /// outside the scheduler.
    pub fn for_tracked(tracked: &TrackedUrl, now: DateTime<Utc>, misfire_grace_secs: u64) -> Self {
        let entry = Self {
            schedule_id: tracked.schedule_id.clone(),
            owner_id: tracked.owner_id.clone(),
            url: tracked.url.clone(),
            interval_minutes: tracked.interval_minutes,
            night_mode: tracked.night_mode,
            next_run_at: now,
            misfire_grace_secs,
        };
        entry.advanced(now)
    }

    pub fn interval(&self) -> Duration {
        Duration::minutes(self.interval_minutes.min(i64::MAX as u64) as i64)
    }

    /// The entry with `next_run_at` moved one interval past `now`.
    ///
    /// Anchoring on `now` rather than the old due time is what coalesces
    /// missed fires: however many intervals were skipped, exactly one run
    /// happens and the schedule resumes from the present.
    pub fn advanced(&self, now: DateTime<Utc>) -> Self {
        let mut next = self.clone();
        next.next_run_at = now + self.interval();
        next
    }

    /// Whether a fire at `now` is past the misfire grace window.
    pub fn is_misfire(&self, now: DateTime<Utc>) -> bool {
        now - self.next_run_at > Duration::seconds(self.misfire_grace_secs.min(i64::MAX as u64) as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FileKind;

    fn file(url: &str) -> FileRef {
        FileRef::new("f", url, FileKind::Document)
    }

    #[test]
    fn schedule_id_is_stable_per_owner_and_url() {
        let a = schedule_id("42", "https://example.com/docs");
        let b = schedule_id("42", "https://example.com/docs");
        let c = schedule_id("43", "https://example.com/docs");
        let d = schedule_id("42", "https://example.com/other");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
    }

    #[test]
    fn merge_files_keeps_urls_unique() {
        let mut tracked = TrackedUrl::new("42", "https://example.com", 30, false);
        tracked.merge_files(vec![file("https://example.com/a.pdf")]);
        tracked.merge_files(vec![
            file("https://example.com/a.pdf"),
            file("https://example.com/b.pdf"),
        ]);
        assert_eq!(tracked.files.len(), 2);
    }

    #[test]
    fn owner_record_rejects_duplicate_url() {
        let mut record = OwnerRecord::new("42");
        record
            .insert(TrackedUrl::new("42", "https://example.com", 30, false))
            .unwrap();
        let err = record
            .insert(TrackedUrl::new("42", "https://example.com", 15, true))
            .unwrap_err();
        assert!(matches!(err, AppError::Tracking(_)));
    }

    #[test]
    fn owner_record_remove_returns_entry() {
        let mut record = OwnerRecord::new("42");
        record
            .insert(TrackedUrl::new("42", "https://example.com", 30, false))
            .unwrap();
        assert!(record.remove("https://example.com").is_some());
        assert!(record.remove("https://example.com").is_none());
    }

    #[test]
    fn advanced_anchors_on_now() {
        let tracked = TrackedUrl::new("42", "https://example.com", 30, false);
        let t0 = Utc::now();
        let entry = ScheduleEntry::for_tracked(&tracked, t0, 3600);
        assert_eq!(entry.next_run_at, t0 + Duration::minutes(30));

        // Process was down for many intervals; one advance resumes from now.
        let late = t0 + Duration::hours(10);
        let caught_up = entry.advanced(late);
        assert_eq!(caught_up.next_run_at, late + Duration::minutes(30));
    }

    #[test]
    fn misfire_detection_uses_grace_window() {
        let tracked = TrackedUrl::new("42", "https://example.com", 30, false);
        let t0 = Utc::now();
        let entry = ScheduleEntry::for_tracked(&tracked, t0, 3600);

        let slightly_late = entry.next_run_at + Duration::seconds(60);
        let way_late = entry.next_run_at + Duration::hours(2);
        assert!(!entry.is_misfire(slightly_late));
        assert!(entry.is_misfire(way_late));
    }
}
