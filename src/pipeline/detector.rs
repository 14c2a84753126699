//! Per-URL check cycle orchestration.
//!
//! One cycle walks fetch → fingerprint → diff → deliver → commit. Fetch
//! failures end the cycle without touching stored state; the stored
//! hash and file set only ever reflect a fully processed cycle.

use std::sync::Arc;

use chrono::Utc;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{Config, FileRef};
use crate::pipeline::delivery::{DeliveryPipeline, DeliveryResult};
use crate::pipeline::diff::diff_files;
use crate::services::fingerprint::fingerprint;
use crate::services::{FileExtractor, Notifier, PageFetcher};
use crate::storage::TrackingStore;

/// Terminal state of one check cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    /// Fetch failed; stored state untouched, next fire retries
    Failed { message: String },

    /// Content fingerprint matches the stored one
    Unchanged,

    /// Page changed but every extracted file was already known
    NoNewFiles,

    /// New files were handed to the delivery pipeline
    Delivered { delivered: usize, failed: usize },
}

/// Orchestrates check cycles for tracked URLs.
pub struct UpdateDetector {
    store: Arc<dyn TrackingStore>,
    fetcher: Arc<dyn PageFetcher>,
    notifier: Arc<dyn Notifier>,
    extractor: FileExtractor,
    delivery: DeliveryPipeline,
}

impl UpdateDetector {
    pub fn new(
        config: Arc<Config>,
        store: Arc<dyn TrackingStore>,
        fetcher: Arc<dyn PageFetcher>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let extractor = FileExtractor::new(config.extractor.clone());
        let delivery = DeliveryPipeline::new(
            Arc::clone(&config),
            Arc::clone(&fetcher),
            Arc::clone(&notifier),
        );
        Self {
            store,
            fetcher,
            notifier,
            extractor,
            delivery,
        }
    }

    /// Run one check cycle for an owner's tracked URL.
    ///
    /// Returns the terminal state; `Err` is reserved for tracking-state
    /// and persistence problems, not for fetch failures.
    pub async fn run_check(&self, owner_id: &str, url: &str) -> Result<CheckOutcome> {
        let tracked = self
            .store
            .get_tracked(owner_id, url)
            .await?
            .ok_or_else(|| AppError::tracking(format!("{url} is not tracked by {owner_id}")))?;

        let page = match self.fetcher.fetch(url).await {
            Ok(page) => page,
            Err(e) => {
                log::warn!("Check failed for {url}: {e}");
                return Ok(CheckOutcome::Failed {
                    message: e.to_string(),
                });
            }
        };

        let hash = fingerprint(&page.bytes);
        let now = Utc::now();

        if tracked.hash.as_deref() == Some(hash.as_str()) {
            self.store.touch_checked(owner_id, url, now).await?;
            return Ok(CheckOutcome::Unchanged);
        }

        // The hash moved. Extraction failure modes (bad base URL, markup
        // the parser cannot recover) degrade to an empty candidate set.
        let html = String::from_utf8_lossy(&page.bytes);
        let current = match Url::parse(url) {
            Ok(base) => self.extractor.extract(&html, &base),
            Err(_) => Vec::new(),
        };

        // The first observation is a baseline, not a change.
        if tracked.hash.is_some() {
            self.notify(owner_id, &format!("Page changed: {url}")).await;
        }

        let diff = diff_files(&tracked.files, &current);
        if diff.removed > 0 {
            log::debug!("{} file(s) disappeared from {url}", diff.removed);
        }

        if !diff.has_new_files() {
            self.store
                .commit_check(owner_id, url, Some(hash), Vec::new(), now)
                .await?;
            return Ok(CheckOutcome::NoNewFiles);
        }

        log::info!(
            "{} new file(s) on {url} for {owner_id}",
            diff.new_files.len()
        );
        let results = self.delivery.deliver(owner_id, diff.new_files).await;

        let delivered: Vec<FileRef> = results
            .iter()
            .filter(|r| r.ok())
            .map(|r| r.file.clone())
            .collect();
        let failed: Vec<&DeliveryResult> = results.iter().filter(|r| !r.ok()).collect();

        if !failed.is_empty() {
            self.report_failures(owner_id, &failed).await;
        }

        // Advance the hash only when every file made it through. After a
        // partial failure the old hash stays, so the next cycle diffs
        // again and re-offers exactly the files still missing.
        let commit_hash = if failed.is_empty() {
            Some(hash)
        } else {
            tracked.hash.clone()
        };

        let counts = (delivered.len(), failed.len());
        self.store
            .commit_check(owner_id, url, commit_hash, delivered, now)
            .await?;

        Ok(CheckOutcome::Delivered {
            delivered: counts.0,
            failed: counts.1,
        })
    }

    async fn notify(&self, owner_id: &str, text: &str) {
        if let Err(e) = self.notifier.send_message(owner_id, text).await {
            log::warn!("Failed to notify {owner_id}: {e}");
        }
    }

    async fn report_failures(&self, owner_id: &str, failed: &[&DeliveryResult]) {
        for result in failed {
            if let Some(error) = &result.error {
                log::warn!("Delivery failed for {}: {error}", result.file.url);
            }
        }

        let mut lines = vec![format!(
            "{} file(s) could not be delivered and will be retried:",
            failed.len()
        )];
        for result in failed {
            lines.push(result.file.url.clone());
        }
        self.notify(owner_id, &lines.join("\n")).await;
    }
}
