// src/error.rs

//! Unified error handling for the pagewatch application.

use std::fmt;

use thiserror::Error;

/// Result type alias for pagewatch operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization failed
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Command rejected: sender is not on the allow list
    #[error("Unauthorized: {0}")]
    Authorization(String),

    /// Tracking state error (duplicate URL, unknown URL)
    #[error("Tracking error: {0}")]
    Tracking(String),

    /// Durable store write/read failed in a way that invalidates the cycle
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Page fetch failed (network, timeout, non-2xx status)
    #[error("Fetch error for {url}: {message}")]
    Fetch { url: String, message: String },

    /// File download failed
    #[error("Download error for {url}: {message}")]
    Download { url: String, message: String },

    /// Notification channel rejected a file
    #[error("Delivery error for {file}: {message}")]
    Delivery { file: String, message: String },
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create an authorization error.
    pub fn authorization(message: impl Into<String>) -> Self {
        Self::Authorization(message.into())
    }

    /// Create a tracking state error.
    pub fn tracking(message: impl Into<String>) -> Self {
        Self::Tracking(message.into())
    }

    /// Create a persistence error.
    pub fn persistence(message: impl fmt::Display) -> Self {
        Self::Persistence(message.to_string())
    }

    /// Create a fetch error with the offending URL.
    pub fn fetch(url: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Fetch {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Create a download error with the offending URL.
    pub fn download(url: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Download {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Create a delivery error for a single file.
    pub fn delivery(file: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Delivery {
            file: file.into(),
            message: message.to_string(),
        }
    }
}
