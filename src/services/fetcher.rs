//! Page and file fetching.
//!
//! `PageFetcher` is the collaborator seam for raw HTTP: the update
//! detector and delivery pipeline only see `fetch(url) -> bytes +
//! content type`, so tests and embedders can substitute fakes.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::models::HttpConfig;

/// A fetched HTTP response body.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// Abstract page fetch contract.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch a URL with a bounded timeout. Network errors, timeouts and
    /// non-2xx statuses all surface as `AppError::Fetch`.
    async fn fetch(&self, url: &str) -> Result<FetchedPage>;
}

/// Default fetcher backed by a shared reqwest client.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Create a fetcher with the configured user agent and timeout.
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::fetch(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::fetch(url, format!("HTTP status {status}")));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AppError::fetch(url, e))?
            .to_vec();

        Ok(FetchedPage {
            bytes,
            content_type,
        })
    }
}
