//! Notification channel seam.
//!
//! The chat/bot transport is an external collaborator. The engine only
//! needs two operations: send a text message and send a local file with
//! a caption. `LogNotifier` is the default sink used by the CLI until a
//! real transport is wired in.

use std::path::Path;

use async_trait::async_trait;

use crate::error::Result;

/// Abstract notification channel.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send a text message to a user/channel destination.
    async fn send_message(&self, destination: &str, text: &str) -> Result<()>;

    /// Send a local file to a destination with a caption.
    async fn send_file(&self, destination: &str, local_path: &Path, caption: &str) -> Result<()>;
}

/// Notifier that writes deliveries to the application log.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_message(&self, destination: &str, text: &str) -> Result<()> {
        log::info!("[notify {}] {}", destination, text);
        Ok(())
    }

    async fn send_file(&self, destination: &str, local_path: &Path, caption: &str) -> Result<()> {
        log::info!(
            "[notify {}] file {} ({})",
            destination,
            local_path.display(),
            caption.lines().next().unwrap_or("")
        );
        Ok(())
    }
}
