//! Application configuration structures.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::FileKind;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP client behavior settings
    #[serde(default)]
    pub http: HttpConfig,

    /// File extraction settings
    #[serde(default)]
    pub extractor: ExtractorConfig,

    /// Delivery pipeline settings
    #[serde(default)]
    pub delivery: DeliveryConfig,

    /// Scheduler settings
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.http.user_agent.trim().is_empty() {
            return Err(AppError::validation("http.user_agent is empty"));
        }
        if self.http.timeout_secs == 0 {
            return Err(AppError::validation("http.timeout_secs must be > 0"));
        }
        if self.extractor.is_empty() {
            return Err(AppError::validation(
                "extractor defines no allowed extensions",
            ));
        }
        if self.delivery.max_file_bytes == 0 {
            return Err(AppError::validation("delivery.max_file_bytes must be > 0"));
        }
        if self.delivery.max_concurrent == 0 {
            return Err(AppError::validation("delivery.max_concurrent must be > 0"));
        }
        if self.scheduler.tick_secs == 0 {
            return Err(AppError::validation("scheduler.tick_secs must be > 0"));
        }
        if self.scheduler.max_concurrent_checks == 0 {
            return Err(AppError::validation(
                "scheduler.max_concurrent_checks must be > 0",
            ));
        }
        if self.scheduler.active_start_hour > 23 || self.scheduler.active_end_hour > 23 {
            return Err(AppError::validation("scheduler active hours must be 0-23"));
        }
        if self.scheduler.active_start_hour > self.scheduler.active_end_hour {
            return Err(AppError::validation(
                "scheduler.active_start_hour must not exceed active_end_hour",
            ));
        }
        if self.scheduler.utc_offset_minutes.abs() >= 24 * 60 {
            return Err(AppError::validation(
                "scheduler.utc_offset_minutes must be within one day",
            ));
        }
        Ok(())
    }
}

/// HTTP client settings shared by page fetches and file downloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
        }
    }
}

/// Allowed file extensions, grouped by file kind.
///
/// Only URLs whose path extension matches one of these groups become
/// file candidates. Extensionless URLs are dropped without content-type
/// sniffing; that precision/recall tradeoff is intentional.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorConfig {
    #[serde(default = "defaults::document_exts")]
    pub document_exts: Vec<String>,

    #[serde(default = "defaults::image_exts")]
    pub image_exts: Vec<String>,

    #[serde(default = "defaults::audio_exts")]
    pub audio_exts: Vec<String>,

    #[serde(default = "defaults::video_exts")]
    pub video_exts: Vec<String>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            document_exts: defaults::document_exts(),
            image_exts: defaults::image_exts(),
            audio_exts: defaults::audio_exts(),
            video_exts: defaults::video_exts(),
        }
    }
}

impl ExtractorConfig {
    /// Map a lowercase extension (with leading dot) to its file kind.
    pub fn kind_for(&self, ext: &str) -> Option<FileKind> {
        if self.image_exts.iter().any(|e| e == ext) {
            Some(FileKind::Image)
        } else if self.audio_exts.iter().any(|e| e == ext) {
            Some(FileKind::Audio)
        } else if self.video_exts.iter().any(|e| e == ext) {
            Some(FileKind::Video)
        } else if self.document_exts.iter().any(|e| e == ext) {
            Some(FileKind::Document)
        } else {
            None
        }
    }

    fn is_empty(&self) -> bool {
        self.document_exts.is_empty()
            && self.image_exts.is_empty()
            && self.audio_exts.is_empty()
            && self.video_exts.is_empty()
    }
}

/// Delivery pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Maximum size of a single downloaded file in bytes
    #[serde(default = "defaults::max_file_bytes")]
    pub max_file_bytes: u64,

    /// Maximum size of the batch manifest text; larger manifests are
    /// discarded outright, never truncated
    #[serde(default = "defaults::max_summary_bytes")]
    pub max_summary_bytes: usize,

    /// Maximum concurrent downloads within one delivery pass
    #[serde(default = "defaults::max_concurrent_downloads")]
    pub max_concurrent: usize,

    /// Whether to send the batch manifest before per-file delivery
    #[serde(default = "defaults::send_summary")]
    pub send_summary: bool,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: defaults::max_file_bytes(),
            max_summary_bytes: defaults::max_summary_bytes(),
            max_concurrent: defaults::max_concurrent_downloads(),
            send_summary: defaults::send_summary(),
        }
    }
}

/// Scheduler settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Dispatcher tick interval in seconds
    #[serde(default = "defaults::tick_secs")]
    pub tick_secs: u64,

    /// Maximum check cycles running at once
    #[serde(default = "defaults::max_concurrent_checks")]
    pub max_concurrent_checks: usize,

    /// Grace window before a late fire counts as a misfire
    #[serde(default = "defaults::misfire_grace_secs")]
    pub misfire_grace_secs: u64,

    /// First local hour (inclusive) at which night-mode schedules may fire
    #[serde(default = "defaults::active_start_hour")]
    pub active_start_hour: u32,

    /// Last local hour (inclusive) at which night-mode schedules may fire
    #[serde(default = "defaults::active_end_hour")]
    pub active_end_hour: u32,

    /// Reference timezone for the active-hour window, as minutes east of UTC
    #[serde(default = "defaults::utc_offset_minutes")]
    pub utc_offset_minutes: i32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_secs: defaults::tick_secs(),
            max_concurrent_checks: defaults::max_concurrent_checks(),
            misfire_grace_secs: defaults::misfire_grace_secs(),
            active_start_hour: defaults::active_start_hour(),
            active_end_hour: defaults::active_end_hour(),
            utc_offset_minutes: defaults::utc_offset_minutes(),
        }
    }
}

mod defaults {
    // HTTP defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; pagewatch/0.1)".into()
    }
    pub fn timeout() -> u64 {
        30
    }

    // Extractor defaults
    pub fn document_exts() -> Vec<String> {
        [".pdf", ".doc", ".docx", ".xls", ".xlsx", ".ppt", ".pptx", ".txt"]
            .map(String::from)
            .to_vec()
    }
    pub fn image_exts() -> Vec<String> {
        [".jpg", ".jpeg", ".png", ".gif", ".webp", ".bmp"]
            .map(String::from)
            .to_vec()
    }
    pub fn audio_exts() -> Vec<String> {
        [".mp3", ".wav", ".ogg"].map(String::from).to_vec()
    }
    pub fn video_exts() -> Vec<String> {
        [".mp4", ".mov", ".avi", ".mkv"].map(String::from).to_vec()
    }

    // Delivery defaults
    pub fn max_file_bytes() -> u64 {
        45 * 1024 * 1024
    }
    pub fn max_summary_bytes() -> usize {
        4096
    }
    pub fn max_concurrent_downloads() -> usize {
        4
    }
    pub fn send_summary() -> bool {
        true
    }

    // Scheduler defaults
    pub fn tick_secs() -> u64 {
        30
    }
    pub fn max_concurrent_checks() -> usize {
        5
    }
    pub fn misfire_grace_secs() -> u64 {
        3600
    }
    pub fn active_start_hour() -> u32 {
        6
    }
    pub fn active_end_hour() -> u32 {
        22
    }
    pub fn utc_offset_minutes() -> i32 {
        330
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_default_config_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_user_agent() {
        let mut config = Config::default();
        config.http.user_agent = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_tick() {
        let mut config = Config::default();
        config.scheduler.tick_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_inverted_active_hours() {
        let mut config = Config::default();
        config.scheduler.active_start_hour = 23;
        config.scheduler.active_end_hour = 6;
        assert!(config.validate().is_err());
    }

    #[test]
    fn kind_for_maps_extension_groups() {
        let extractor = ExtractorConfig::default();
        assert_eq!(extractor.kind_for(".pdf"), Some(FileKind::Document));
        assert_eq!(extractor.kind_for(".png"), Some(FileKind::Image));
        assert_eq!(extractor.kind_for(".mp3"), Some(FileKind::Audio));
        assert_eq!(extractor.kind_for(".mkv"), Some(FileKind::Video));
        assert_eq!(extractor.kind_for(".exe"), None);
    }

    #[test]
    fn config_parses_partial_toml() {
        let config: Config = toml::from_str(
            r#"
            [scheduler]
            tick_secs = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.scheduler.tick_secs, 5);
        assert_eq!(config.http.timeout_secs, 30);
    }
}
