//! Subscription-provider webhook events.
//!
//! Deliveries are read in two steps: the envelope first, so that events
//! other than `new_subscription` are acknowledged whatever their payload
//! looks like, then the typed payload for the one event that matters.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::WebhookError;
use crate::domain::foundation::TelegramId;
use crate::domain::purchase::BillingPeriod;

/// The only event name that leads to a purchase.
pub const NEW_SUBSCRIPTION_EVENT: &str = "new_subscription";

/// Envelope sent by the subscription provider, payload still untyped.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEnvelope {
    pub name: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub sent_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// A `new_subscription` delivery with its payload decoded.
#[derive(Debug, Clone)]
pub struct SubscriptionWebhookEvent {
    pub name: String,
    pub created_at: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
    pub payload: SubscriptionPayload,
}

/// Event payload. Only the buyer, amount and period are required.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionPayload {
    pub telegram_user_id: TelegramId,
    pub amount: i64,
    pub period: String,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub subscription_id: Option<i64>,
    #[serde(default)]
    pub subscription_name: Option<String>,
    #[serde(default)]
    pub period_id: Option<i64>,
    #[serde(default)]
    pub price: Option<i64>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl WebhookEnvelope {
    /// Parses a verified body without looking inside the payload.
    pub fn parse(body: &[u8]) -> Result<Self, WebhookError> {
        serde_json::from_slice(body).map_err(|e| WebhookError::ParseError(e.to_string()))
    }

    pub fn is_new_subscription(&self) -> bool {
        self.name == NEW_SUBSCRIPTION_EVENT
    }

    /// Decodes the payload of a `new_subscription` event.
    pub fn into_subscription(self) -> Result<SubscriptionWebhookEvent, WebhookError> {
        let payload = serde_json::from_value(self.payload)
            .map_err(|e| WebhookError::ParseError(e.to_string()))?;
        Ok(SubscriptionWebhookEvent {
            name: self.name,
            created_at: self.created_at,
            sent_at: self.sent_at,
            payload,
        })
    }
}

impl SubscriptionWebhookEvent {
    /// Plan length derived from the billing period keyword.
    pub fn months(&self) -> i32 {
        BillingPeriod::months_from_keyword(&self.payload.period)
    }
}
