use async_trait::async_trait;
use aws_sdk_sns::Client;
use aws_sdk_sns::error::DisplayErrorContext;
use tracing::debug;

use crate::{Notifier, NotifyError};

/// Publishes messages to an Amazon SNS topic.
pub struct SnsNotifier {
  client: Client,
  topic_arn: String,
}

impl SnsNotifier {
  pub fn new(client: Client, topic_arn: impl Into<String>) -> Self {
    Self {
      client,
      topic_arn: topic_arn.into(),
    }
  }

  /// Create a notifier using the default AWS credential chain.
  pub async fn from_env(topic_arn: impl Into<String>, region: Option<String>) -> Self {
    let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
    if let Some(region) = region {
      loader = loader.region(aws_config::Region::new(region));
    }
    let shared = loader.load().await;
    Self::new(Client::new(&shared), topic_arn)
  }
}

#[async_trait]
impl Notifier for SnsNotifier {
  async fn notify(&self, message: &str) -> Result<(), NotifyError> {
    let output = self
      .client
      .publish()
      .topic_arn(&self.topic_arn)
      .message(message)
      .send()
      .await
      .map_err(|e| NotifyError::Rejected(DisplayErrorContext(e).to_string()))?;

    debug!(topic = %self.topic_arn, message_id = ?output.message_id(), "published notification");
    Ok(())
  }
}
