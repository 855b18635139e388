//! Axum router for the webhook endpoint.

use axum::{routing::post, Router};

use super::handlers::{handle_subscription_webhook, WebhookAppState};

/// Create the webhook router.
///
/// # Routes
/// - `POST /webhook` - subscription provider push, signature verified
pub fn webhook_router() -> Router<WebhookAppState> {
    Router::new().route("/webhook", post(handle_subscription_webhook))
}
