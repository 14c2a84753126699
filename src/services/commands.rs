// src/services/commands.rs

//! Command surface: track, untrack, list, list-files, allow-list
//! management. Every command checks authorization first and mutates
//! nothing when rejected.

use std::sync::Arc;

use chrono::Utc;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{Config, FileRef, ScheduleEntry, TrackedUrl};
use crate::pipeline::{CheckOutcome, UpdateDetector};
use crate::storage::TrackingStore;

/// Service backing the user-facing command intents.
pub struct CommandService {
    config: Arc<Config>,
    store: Arc<dyn TrackingStore>,
    detector: Arc<UpdateDetector>,
}

impl CommandService {
    pub fn new(
        config: Arc<Config>,
        store: Arc<dyn TrackingStore>,
        detector: Arc<UpdateDetector>,
    ) -> Self {
        Self {
            config,
            store,
            detector,
        }
    }

    /// Start tracking a URL for an owner and run the first check cycle
    /// immediately, delivering whatever files the page already offers.
    pub async fn track(
        &self,
        owner_id: &str,
        url: &str,
        interval_minutes: u64,
        night_mode: bool,
    ) -> Result<CheckOutcome> {
        self.ensure_authorized(owner_id).await?;

        let parsed = Url::parse(url)?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(AppError::validation(format!(
                "only http(s) URLs can be tracked, got {url}"
            )));
        }
        if interval_minutes == 0 {
            return Err(AppError::validation("interval must be at least 1 minute"));
        }

        let tracked = TrackedUrl::new(owner_id, url, interval_minutes, night_mode);
        let entry = ScheduleEntry::for_tracked(
            &tracked,
            Utc::now(),
            self.config.scheduler.misfire_grace_secs,
        );

        self.store.insert_tracked(tracked).await?;
        self.store.upsert_schedule(entry).await?;

        log::info!("{owner_id} is now tracking {url} every {interval_minutes}m");

        // A failed first fetch is not fatal; the schedule retries it.
        self.detector.run_check(owner_id, url).await
    }

    /// Stop tracking a URL and drop its schedule entry.
    pub async fn untrack(&self, owner_id: &str, url: &str) -> Result<()> {
        self.ensure_authorized(owner_id).await?;

        let removed = self.store.remove_tracked(owner_id, url).await?;
        self.store.remove_schedule(&removed.schedule_id).await?;

        log::info!("{owner_id} stopped tracking {url}");
        Ok(())
    }

    /// All URLs tracked by an owner.
    pub async fn list(&self, owner_id: &str) -> Result<Vec<TrackedUrl>> {
        self.ensure_authorized(owner_id).await?;
        self.store.list_tracked(owner_id).await
    }

    /// The stored file set for one tracked URL.
    pub async fn list_files(&self, owner_id: &str, url: &str) -> Result<Vec<FileRef>> {
        self.ensure_authorized(owner_id).await?;
        let tracked = self
            .store
            .get_tracked(owner_id, url)
            .await?
            .ok_or_else(|| AppError::tracking(format!("{url} is not tracked by {owner_id}")))?;
        Ok(tracked.files)
    }

    /// Add a target to the allow list. The first actor on an
    /// unprovisioned store becomes sudo.
    pub async fn authorize(&self, actor: &str, target: &str) -> Result<bool> {
        let mut list = self.store.load_allowlist().await?;

        if list.sudo.is_empty() {
            list.sudo.push(actor.to_string());
        } else if !list.is_sudo(actor) {
            return Err(AppError::authorization(format!(
                "{actor} may not manage the allow list"
            )));
        }

        let added = list.add(target);
        self.store.save_allowlist(list).await?;
        Ok(added)
    }

    /// Remove a target from the allow list along with all of its tracked
    /// URLs and schedule entries.
    pub async fn revoke(&self, actor: &str, target: &str) -> Result<bool> {
        let mut list = self.store.load_allowlist().await?;
        if !list.is_sudo(actor) {
            return Err(AppError::authorization(format!(
                "{actor} may not manage the allow list"
            )));
        }

        let removed = list.remove(target);
        self.store.save_allowlist(list).await?;

        for tracked in self.store.list_tracked(target).await? {
            self.store.remove_tracked(target, &tracked.url).await?;
            self.store.remove_schedule(&tracked.schedule_id).await?;
        }

        Ok(removed)
    }

    async fn ensure_authorized(&self, owner_id: &str) -> Result<()> {
        let list = self.store.load_allowlist().await?;
        if list.is_authorized(owner_id) {
            Ok(())
        } else {
            Err(AppError::authorization(format!(
                "{owner_id} is not on the allow list"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AllowList;
    use crate::services::{FetchedPage, Notifier, PageFetcher};
    use crate::storage::JsonStore;
    use async_trait::async_trait;
    use std::path::Path;
    use tempfile::TempDir;

    struct OnePageFetcher;

    #[async_trait]
    impl PageFetcher for OnePageFetcher {
        async fn fetch(&self, url: &str) -> Result<FetchedPage> {
            let body: &[u8] = if url.ends_with(".pdf") {
                b"pdf bytes"
            } else {
                br#"<a href="report.pdf">report</a>"#
            };
            Ok(FetchedPage {
                bytes: body.to_vec(),
                content_type: None,
            })
        }
    }

    struct NullNotifier;

    #[async_trait]
    impl Notifier for NullNotifier {
        async fn send_message(&self, _d: &str, _t: &str) -> Result<()> {
            Ok(())
        }
        async fn send_file(&self, _d: &str, _p: &Path, _c: &str) -> Result<()> {
            Ok(())
        }
    }

    async fn service(tmp: &TempDir) -> (CommandService, Arc<JsonStore>) {
        let config = Arc::new(Config::default());
        let store = Arc::new(JsonStore::new(tmp.path()));

        let mut list = AllowList::default();
        list.add("42");
        list.sudo.push("admin".into());
        store.save_allowlist(list).await.unwrap();

        let detector = Arc::new(UpdateDetector::new(
            Arc::clone(&config),
            Arc::clone(&store) as Arc<dyn TrackingStore>,
            Arc::new(OnePageFetcher),
            Arc::new(NullNotifier),
        ));
        let service = CommandService::new(
            config,
            Arc::clone(&store) as Arc<dyn TrackingStore>,
            detector,
        );
        (service, store)
    }

    #[tokio::test]
    async fn track_runs_an_immediate_check() {
        let tmp = TempDir::new().unwrap();
        let (service, store) = service(&tmp).await;

        let outcome = service
            .track("42", "https://example.com/docs", 30, false)
            .await
            .unwrap();
        assert_eq!(outcome, CheckOutcome::Delivered { delivered: 1, failed: 0 });

        let tracked = store
            .get_tracked("42", "https://example.com/docs")
            .await
            .unwrap()
            .unwrap();
        assert!(tracked.hash.is_some());
        assert_eq!(tracked.files.len(), 1);
        assert_eq!(store.load_schedules().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn track_rejects_malformed_and_non_http_urls() {
        let tmp = TempDir::new().unwrap();
        let (service, _) = service(&tmp).await;

        assert!(matches!(
            service.track("42", "not a url", 30, false).await,
            Err(AppError::Url(_))
        ));
        assert!(matches!(
            service.track("42", "ftp://example.com/x", 30, false).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn track_rejects_duplicates() {
        let tmp = TempDir::new().unwrap();
        let (service, _) = service(&tmp).await;

        service
            .track("42", "https://example.com/docs", 30, false)
            .await
            .unwrap();
        let err = service
            .track("42", "https://example.com/docs", 15, true)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Tracking(_)));
    }

    #[tokio::test]
    async fn unauthorized_commands_mutate_nothing() {
        let tmp = TempDir::new().unwrap();
        let (service, store) = service(&tmp).await;

        let err = service
            .track("99", "https://example.com/docs", 30, false)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Authorization(_)));
        assert!(store.list_tracked("99").await.unwrap().is_empty());
        assert!(store.load_schedules().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn untrack_removes_url_and_schedule() {
        let tmp = TempDir::new().unwrap();
        let (service, store) = service(&tmp).await;

        service
            .track("42", "https://example.com/docs", 30, false)
            .await
            .unwrap();
        service
            .untrack("42", "https://example.com/docs")
            .await
            .unwrap();

        assert!(store.list_tracked("42").await.unwrap().is_empty());
        assert!(store.load_schedules().await.unwrap().is_empty());

        let err = service
            .untrack("42", "https://example.com/docs")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Tracking(_)));
    }

    #[tokio::test]
    async fn list_files_returns_the_stored_set() {
        let tmp = TempDir::new().unwrap();
        let (service, _) = service(&tmp).await;

        service
            .track("42", "https://example.com/docs", 30, false)
            .await
            .unwrap();
        let files = service
            .list_files("42", "https://example.com/docs")
            .await
            .unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].url, "https://example.com/report.pdf");
    }

    #[tokio::test]
    async fn allowlist_management_requires_sudo() {
        let tmp = TempDir::new().unwrap();
        let (service, _) = service(&tmp).await;

        assert!(service.authorize("admin", "77").await.unwrap());
        assert!(matches!(
            service.authorize("42", "88").await,
            Err(AppError::Authorization(_))
        ));

        assert!(service.revoke("admin", "77").await.unwrap());
        assert!(matches!(
            service.revoke("42", "77").await,
            Err(AppError::Authorization(_))
        ));
    }

    #[tokio::test]
    async fn revoke_drops_the_targets_tracking_state() {
        let tmp = TempDir::new().unwrap();
        let (service, store) = service(&tmp).await;

        service
            .track("42", "https://example.com/docs", 30, false)
            .await
            .unwrap();
        service.revoke("admin", "42").await.unwrap();

        assert!(store.list_tracked("42").await.unwrap().is_empty());
        assert!(store.load_schedules().await.unwrap().is_empty());
    }
}
