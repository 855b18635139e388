//! Webhook handlers.

mod handle_subscription_webhook;

pub use handle_subscription_webhook::{
    HandleSubscriptionWebhookCommand, HandleSubscriptionWebhookHandler,
    HandleSubscriptionWebhookResult,
};
