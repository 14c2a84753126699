//! JSON filesystem store.
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//! ├── config.toml           # Application configuration
//! ├── allowlist.json        # Authorized owners and sudo users
//! ├── schedules.json        # Schedule entries keyed by schedule ID
//! └── tracked/              # One record file per owner
//!     └── {owner}.json
//! ```
//!
//! All writes go through write-temp-then-rename so a crash never leaves
//! a half-written record. Mutations take a per-owner async mutex (or the
//! schedules/allow-list mutex) and read-modify-write only the affected
//! entry.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::models::{AllowList, FileRef, OwnerRecord, ScheduleEntry, TrackedUrl};
use crate::storage::TrackingStore;
use crate::utils::sanitize_filename;

/// Local filesystem storage backend.
pub struct JsonStore {
    root_dir: PathBuf,
    owner_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    schedule_lock: Mutex<()>,
    allow_lock: Mutex<()>,
}

impl JsonStore {
    /// Create a store rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            owner_locks: Mutex::new(HashMap::new()),
            schedule_lock: Mutex::new(()),
            allow_lock: Mutex::new(()),
        }
    }

    /// Get the full path for a relative key.
    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    fn owner_key(owner_id: &str) -> String {
        let safe = sanitize_filename(owner_id);
        let safe = if safe.is_empty() {
            "owner".to_string()
        } else {
            safe
        };
        format!("tracked/{safe}.json")
    }

    /// The mutex scoping mutations for one owner.
    async fn owner_lock(&self, owner_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.owner_locks.lock().await;
        locks
            .entry(owner_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        self.ensure_dir(&path).await?;

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Write JSON data.
    async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(key, &bytes).await
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Read JSON data.
    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.read_bytes(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn load_owner(&self, owner_id: &str) -> Result<OwnerRecord> {
        Ok(self
            .read_json(&Self::owner_key(owner_id))
            .await?
            .unwrap_or_else(|| OwnerRecord::new(owner_id)))
    }

    async fn save_owner(&self, record: &OwnerRecord) -> Result<()> {
        self.write_json(&Self::owner_key(&record.owner_id), record)
            .await
    }

    async fn load_schedule_map(&self) -> Result<BTreeMap<String, ScheduleEntry>> {
        Ok(self.read_json("schedules.json").await?.unwrap_or_default())
    }
}

#[async_trait]
impl TrackingStore for JsonStore {
    async fn list_tracked(&self, owner_id: &str) -> Result<Vec<TrackedUrl>> {
        Ok(self.load_owner(owner_id).await?.tracked)
    }

    async fn get_tracked(&self, owner_id: &str, url: &str) -> Result<Option<TrackedUrl>> {
        Ok(self.load_owner(owner_id).await?.find(url).cloned())
    }

    async fn insert_tracked(&self, tracked: TrackedUrl) -> Result<()> {
        let lock = self.owner_lock(&tracked.owner_id).await;
        let _guard = lock.lock().await;

        let mut record = self.load_owner(&tracked.owner_id).await?;
        record.insert(tracked)?;
        self.save_owner(&record).await
    }

    async fn remove_tracked(&self, owner_id: &str, url: &str) -> Result<TrackedUrl> {
        let lock = self.owner_lock(owner_id).await;
        let _guard = lock.lock().await;

        let mut record = self.load_owner(owner_id).await?;
        let removed = record
            .remove(url)
            .ok_or_else(|| AppError::tracking(format!("{url} is not tracked by {owner_id}")))?;
        self.save_owner(&record).await?;
        Ok(removed)
    }

    async fn commit_check(
        &self,
        owner_id: &str,
        url: &str,
        hash: Option<String>,
        delivered: Vec<FileRef>,
        checked_at: DateTime<Utc>,
    ) -> Result<()> {
        let lock = self.owner_lock(owner_id).await;
        let _guard = lock.lock().await;

        let mut record = self
            .load_owner(owner_id)
            .await
            .map_err(|e| AppError::persistence(e))?;
        let tracked = record
            .find_mut(url)
            .ok_or_else(|| AppError::tracking(format!("{url} is no longer tracked")))?;

        tracked.hash = hash;
        tracked.merge_files(delivered);
        tracked.last_checked_at = Some(checked_at);

        self.save_owner(&record)
            .await
            .map_err(|e| AppError::persistence(e))
    }

    async fn touch_checked(
        &self,
        owner_id: &str,
        url: &str,
        checked_at: DateTime<Utc>,
    ) -> Result<()> {
        let lock = self.owner_lock(owner_id).await;
        let _guard = lock.lock().await;

        let mut record = self.load_owner(owner_id).await?;
        let Some(tracked) = record.find_mut(url) else {
            return Ok(());
        };
        tracked.last_checked_at = Some(checked_at);
        self.save_owner(&record)
            .await
            .map_err(|e| AppError::persistence(e))
    }

    async fn load_schedules(&self) -> Result<Vec<ScheduleEntry>> {
        Ok(self.load_schedule_map().await?.into_values().collect())
    }

    async fn upsert_schedule(&self, entry: ScheduleEntry) -> Result<()> {
        let _guard = self.schedule_lock.lock().await;

        let mut map = self.load_schedule_map().await?;
        map.insert(entry.schedule_id.clone(), entry);
        self.write_json("schedules.json", &map).await
    }

    async fn remove_schedule(&self, schedule_id: &str) -> Result<()> {
        let _guard = self.schedule_lock.lock().await;

        let mut map = self.load_schedule_map().await?;
        if map.remove(schedule_id).is_some() {
            self.write_json("schedules.json", &map).await?;
        }
        Ok(())
    }

    async fn load_allowlist(&self) -> Result<AllowList> {
        Ok(self.read_json("allowlist.json").await?.unwrap_or_default())
    }

    async fn save_allowlist(&self, list: AllowList) -> Result<()> {
        let _guard = self.allow_lock.lock().await;
        self.write_json("allowlist.json", &list).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FileKind;
    use tempfile::TempDir;

    fn tracked(owner: &str, url: &str) -> TrackedUrl {
        TrackedUrl::new(owner, url, 30, false)
    }

    fn file(url: &str) -> FileRef {
        FileRef::new("f", url, FileKind::Document)
    }

    #[tokio::test]
    async fn write_and_read_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let store = JsonStore::new(tmp.path());

        store.write_bytes("test.txt", b"hello").await.unwrap();
        let data = store.read_bytes("test.txt").await.unwrap();
        assert_eq!(data, Some(b"hello".to_vec()));
    }

    #[tokio::test]
    async fn read_nonexistent_is_none() {
        let tmp = TempDir::new().unwrap();
        let store = JsonStore::new(tmp.path());

        let data = store.read_bytes("nope.txt").await.unwrap();
        assert!(data.is_none());
    }

    #[tokio::test]
    async fn insert_then_get_tracked() {
        let tmp = TempDir::new().unwrap();
        let store = JsonStore::new(tmp.path());

        store
            .insert_tracked(tracked("42", "https://example.com/docs"))
            .await
            .unwrap();

        let loaded = store
            .get_tracked("42", "https://example.com/docs")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.owner_id, "42");
        assert_eq!(loaded.interval_minutes, 30);
    }

    #[tokio::test]
    async fn duplicate_insert_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let store = JsonStore::new(tmp.path());

        store
            .insert_tracked(tracked("42", "https://example.com"))
            .await
            .unwrap();
        let err = store
            .insert_tracked(tracked("42", "https://example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Tracking(_)));
    }

    #[tokio::test]
    async fn remove_unknown_url_errors() {
        let tmp = TempDir::new().unwrap();
        let store = JsonStore::new(tmp.path());

        let err = store
            .remove_tracked("42", "https://example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Tracking(_)));
    }

    #[tokio::test]
    async fn commit_check_merges_only_into_the_one_entry() {
        let tmp = TempDir::new().unwrap();
        let store = JsonStore::new(tmp.path());

        store
            .insert_tracked(tracked("42", "https://example.com/a"))
            .await
            .unwrap();
        store
            .insert_tracked(tracked("42", "https://example.com/b"))
            .await
            .unwrap();

        store
            .commit_check(
                "42",
                "https://example.com/a",
                Some("h1".into()),
                vec![file("https://example.com/report.pdf")],
                Utc::now(),
            )
            .await
            .unwrap();

        let a = store
            .get_tracked("42", "https://example.com/a")
            .await
            .unwrap()
            .unwrap();
        let b = store
            .get_tracked("42", "https://example.com/b")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(a.hash.as_deref(), Some("h1"));
        assert_eq!(a.files.len(), 1);
        assert!(b.hash.is_none());
        assert!(b.files.is_empty());
    }

    #[tokio::test]
    async fn commit_check_after_untrack_is_a_tracking_error() {
        let tmp = TempDir::new().unwrap();
        let store = JsonStore::new(tmp.path());

        store
            .insert_tracked(tracked("42", "https://example.com"))
            .await
            .unwrap();
        store
            .remove_tracked("42", "https://example.com")
            .await
            .unwrap();

        let err = store
            .commit_check("42", "https://example.com", Some("h".into()), vec![], Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Tracking(_)));
    }

    #[tokio::test]
    async fn schedule_upsert_replaces_by_id() {
        let tmp = TempDir::new().unwrap();
        let store = JsonStore::new(tmp.path());

        let t = tracked("42", "https://example.com");
        let entry = ScheduleEntry::for_tracked(&t, Utc::now(), 3600);
        store.upsert_schedule(entry.clone()).await.unwrap();

        let mut replacement = entry.clone();
        replacement.interval_minutes = 15;
        store.upsert_schedule(replacement).await.unwrap();

        let schedules = store.load_schedules().await.unwrap();
        assert_eq!(schedules.len(), 1);
        assert_eq!(schedules[0].interval_minutes, 15);
    }

    #[tokio::test]
    async fn schedules_survive_reopen() {
        let tmp = TempDir::new().unwrap();
        {
            let store = JsonStore::new(tmp.path());
            let t = tracked("42", "https://example.com");
            store
                .upsert_schedule(ScheduleEntry::for_tracked(&t, Utc::now(), 3600))
                .await
                .unwrap();
        }

        let reopened = JsonStore::new(tmp.path());
        let schedules = reopened.load_schedules().await.unwrap();
        assert_eq!(schedules.len(), 1);
        assert_eq!(schedules[0].owner_id, "42");
    }

    #[tokio::test]
    async fn allowlist_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let store = JsonStore::new(tmp.path());

        let mut list = AllowList::default();
        list.add("42");
        list.sudo.push("admin".into());
        store.save_allowlist(list).await.unwrap();

        let loaded = store.load_allowlist().await.unwrap();
        assert!(loaded.is_authorized("42"));
        assert!(loaded.is_sudo("admin"));
    }
}
