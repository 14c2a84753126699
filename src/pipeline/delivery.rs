//! Delivery pipeline for newly discovered files.
//!
//! Each file is handled independently: download into a batch-scoped
//! temporary directory, hand the artifact to the notification channel,
//! and remove it again on every exit path. One file's failure never
//! aborts the rest of the batch; the caller receives explicit per-file
//! results instead of exceptions.

use std::path::Path;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tempfile::TempDir;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{Config, FileRef};
use crate::services::fingerprint::fingerprint;
use crate::services::{Notifier, PageFetcher};
use crate::utils::{path_extension, path_file_stem, sanitize_filename};

/// Outcome of one file's delivery attempt.
#[derive(Debug)]
pub struct DeliveryResult {
    pub file: FileRef,
    pub error: Option<AppError>,
}

impl DeliveryResult {
    pub fn ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Pipeline shipping new files to a notification destination.
pub struct DeliveryPipeline {
    config: Arc<Config>,
    fetcher: Arc<dyn PageFetcher>,
    notifier: Arc<dyn Notifier>,
}

impl DeliveryPipeline {
    pub fn new(
        config: Arc<Config>,
        fetcher: Arc<dyn PageFetcher>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            config,
            fetcher,
            notifier,
        }
    }

    /// Deliver a batch of files to a destination, returning one result
    /// per file. Downloads run concurrently up to the configured limit;
    /// each file's download, send and cleanup stay on its own temp path.
    pub async fn deliver(&self, destination: &str, files: Vec<FileRef>) -> Vec<DeliveryResult> {
        if files.is_empty() {
            return Vec::new();
        }

        if self.config.delivery.send_summary {
            self.send_manifest(destination, &files).await;
        }

        let scratch = match TempDir::new() {
            Ok(dir) => dir,
            Err(e) => {
                // No scratch space means no file can be materialized.
                let message = format!("cannot create temp dir: {e}");
                return files
                    .into_iter()
                    .map(|file| DeliveryResult {
                        error: Some(AppError::download(&file.url, &message)),
                        file,
                    })
                    .collect();
            }
        };

        let concurrency = self.config.delivery.max_concurrent.max(1);
        let results = stream::iter(files)
            .map(|file| {
                let dir = scratch.path();
                async move {
                    let outcome = self.deliver_one(dir, destination, &file).await;
                    DeliveryResult {
                        file,
                        error: outcome.err(),
                    }
                }
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        // scratch drops here, sweeping anything a failed path left behind
        results
    }

    /// Send the batch manifest, unless it exceeds the configured cap.
    /// A manifest over the cap is discarded whole, never truncated.
    async fn send_manifest(&self, destination: &str, files: &[FileRef]) {
        let manifest = build_manifest(files);
        if manifest.len() > self.config.delivery.max_summary_bytes {
            log::warn!(
                "Manifest for {} files is {} bytes, over the {} byte cap; skipping",
                files.len(),
                manifest.len(),
                self.config.delivery.max_summary_bytes
            );
            return;
        }
        if let Err(e) = self.notifier.send_message(destination, &manifest).await {
            log::warn!("Failed to send manifest to {destination}: {e}");
        }
    }

    async fn deliver_one(&self, dir: &Path, destination: &str, file: &FileRef) -> Result<()> {
        let page = self
            .fetcher
            .fetch(&file.url)
            .await
            .map_err(|e| AppError::download(&file.url, e))?;

        let size = page.bytes.len() as u64;
        if size > self.config.delivery.max_file_bytes {
            return Err(AppError::download(
                &file.url,
                format!(
                    "file is {size} bytes, over the {} byte limit",
                    self.config.delivery.max_file_bytes
                ),
            ));
        }

        let path = dir.join(local_file_name(file, page.content_type.as_deref()));
        tokio::fs::write(&path, &page.bytes)
            .await
            .map_err(|e| AppError::download(&file.url, e))?;

        let sent = self
            .notifier
            .send_file(destination, &path, &file.caption())
            .await;

        // Remove the artifact whether or not the send succeeded.
        if let Err(e) = tokio::fs::remove_file(&path).await {
            log::debug!("Temp file {} already gone: {e}", path.display());
        }

        sent.map_err(|e| AppError::delivery(&file.url, e))
    }
}

/// Batch manifest listing every new file with its type, name and URL.
pub fn build_manifest(files: &[FileRef]) -> String {
    let mut lines = Vec::with_capacity(files.len() + 1);
    lines.push(format!("{} new file(s) detected:", files.len()));
    for file in files {
        lines.push(file.manifest_line());
    }
    lines.join("\n")
}

/// Derive a filesystem-safe local name for a downloaded file.
///
/// The stem comes from the display name (or the URL basename), the
/// extension from the URL path or the declared content type, and a short
/// URL digest keeps names from colliding across files and calls.
pub fn local_file_name(file: &FileRef, content_type: Option<&str>) -> String {
    let parsed = Url::parse(&file.url).ok();

    let stem = {
        let from_name = sanitize_filename(&file.name);
        if !from_name.is_empty() {
            from_name
        } else {
            parsed
                .as_ref()
                .and_then(path_file_stem)
                .map(|s| sanitize_filename(&s))
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "file".to_string())
        }
    };

    let ext = parsed
        .as_ref()
        .and_then(path_extension)
        .unwrap_or_else(|| extension_from_content_type(content_type));

    let tag = &fingerprint(file.url.as_bytes())[..8];
    format!("{stem}-{tag}{ext}")
}

/// Conservative extension fallback from a declared content type.
fn extension_from_content_type(content_type: Option<&str>) -> String {
    let ct = content_type.unwrap_or("").to_lowercase();
    if ct.contains("audio") {
        ".mp3".into()
    } else if ct.contains("video") {
        ".mp4".into()
    } else if ct.contains("image") {
        ".jpg".into()
    } else if ct.contains("pdf") {
        ".pdf".into()
    } else {
        ".bin".into()
    }
}
