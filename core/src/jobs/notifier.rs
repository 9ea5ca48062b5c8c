// storefront_core/src/jobs/notifier.rs

use async_trait::async_trait;
use tracing::info;

use crate::error::{CoreError, CoreResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
  pub to: String,
  pub subject: String,
  pub body: String,
}

/// Outbound message delivery (email or similar).
#[async_trait]
pub trait Notifier: Send + Sync {
  /// Returns the provider's message id.
  async fn send(&self, notification: &Notification) -> CoreResult<String>;
}

/// Logs messages instead of delivering them.
pub struct LogNotifier {
  sender: String,
}

impl LogNotifier {
  pub fn new(sender: impl Into<String>) -> Self {
    Self { sender: sender.into() }
  }
}

#[async_trait]
impl Notifier for LogNotifier {
  async fn send(&self, notification: &Notification) -> CoreResult<String> {
    if notification.to.is_empty() {
      return Err(CoreError::Validation("Notification recipient is empty.".to_string()));
    }
    let body_preview: String = notification.body.chars().take(50).collect();
    let message_id = format!("mock_email_{}", uuid::Uuid::new_v4());
    info!(
      to = %notification.to,
      from = %self.sender,
      subject = %notification.subject,
      %body_preview,
      %message_id,
      "Mock email sent."
    );
    Ok(message_id)
  }
}
