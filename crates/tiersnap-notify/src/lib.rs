//! Tiersnap Notify
//!
//! Failure notification sinks. When a run fails, the binary hands the full
//! error description to exactly one [`Notifier`]:
//! - [`SnsNotifier`] (feature `sns`) publishes to an SNS topic
//! - [`WebhookNotifier`] posts JSON to an HTTP endpoint
//! - [`StderrNotifier`] writes to standard error
//!
//! [`ChannelNotifier`] forwards messages to a channel and is mostly useful in
//! tests.

#[cfg(feature = "sns")]
mod sns;

#[cfg(feature = "sns")]
pub use sns::SnsNotifier;

use std::io::Write;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

/// Error type for notification delivery.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
  /// An HTTP request failed or returned an error status.
  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),

  /// Writing to a local stream failed.
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  /// The notification backend rejected the message.
  #[error("notification rejected: {0}")]
  Rejected(String),
}

/// A sink for unrecoverable errors.
#[async_trait]
pub trait Notifier: Send + Sync {
  /// Deliver a message describing a failed run.
  async fn notify(&self, message: &str) -> Result<(), NotifyError>;
}

/// Writes messages to standard error.
#[derive(Debug, Clone, Default)]
pub struct StderrNotifier;

#[async_trait]
impl Notifier for StderrNotifier {
  async fn notify(&self, message: &str) -> Result<(), NotifyError> {
    let mut stderr = std::io::stderr().lock();
    writeln!(stderr, "{}", message)?;
    Ok(())
  }
}

/// Posts messages as JSON to an HTTP endpoint.
///
/// The body is `{"source": "tiersnap", "message": "..."}`. Any non-2xx
/// status is treated as a delivery failure.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
  client: reqwest::Client,
  url: String,
}

impl WebhookNotifier {
  pub fn new(url: impl Into<String>) -> Self {
    Self {
      client: reqwest::Client::new(),
      url: url.into(),
    }
  }
}

#[async_trait]
impl Notifier for WebhookNotifier {
  async fn notify(&self, message: &str) -> Result<(), NotifyError> {
    let body = serde_json::json!({
      "source": "tiersnap",
      "message": message,
    });

    let response = self
      .client
      .post(&self.url)
      .json(&body)
      .send()
      .await?
      .error_for_status()?;

    debug!(url = %self.url, status = response.status().as_u16(), "webhook notified");
    Ok(())
  }
}

/// Sends messages to an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
  sender: mpsc::UnboundedSender<String>,
}

impl ChannelNotifier {
  pub fn new(sender: mpsc::UnboundedSender<String>) -> Self {
    Self { sender }
  }
}

#[async_trait]
impl Notifier for ChannelNotifier {
  async fn notify(&self, message: &str) -> Result<(), NotifyError> {
    self
      .sender
      .send(message.to_string())
      .map_err(|_| NotifyError::Rejected("notification channel closed".to_string()))
  }
}
