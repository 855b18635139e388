//! Notifier port - message delivery to a buyer's chat.
//!
//! Delivery failures are logged by callers, never retried.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::foundation::TelegramId;

/// A message with an optional single button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub chat_id: TelegramId,
    pub text: String,
    pub action: Option<NotificationAction>,
}

impl Notification {
    pub fn text(chat_id: TelegramId, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            text: text.into(),
            action: None,
        }
    }

    pub fn with_action(mut self, action: NotificationAction) -> Self {
        self.action = Some(action);
        self
    }
}

/// Button attached to a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationAction {
    /// Opens a link.
    Url { label: String, url: String },
    /// Sends callback data back to the bot.
    Callback { label: String, data: String },
}

#[derive(Debug, Clone, Error)]
pub enum NotifierError {
    #[error("delivery failed: {0}")]
    Delivery(String),

    #[error("chat rejected the message: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: Notification) -> Result<(), NotifierError>;
}
