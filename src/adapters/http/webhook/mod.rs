//! HTTP adapter for the subscription-provider webhook.

mod dto;
mod handlers;
mod routes;

pub use dto::{AckResponse, ErrorResponse};
pub use handlers::{handle_subscription_webhook, WebhookApiError, WebhookAppState};
pub use routes::webhook_router;
