//! HTTP handler for the subscription webhook.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::application::handlers::webhook::{
    HandleSubscriptionWebhookCommand, HandleSubscriptionWebhookHandler,
};
use crate::application::payment::PaymentOrchestrator;
use crate::domain::webhook::{SignatureVerifier, WebhookError, SIGNATURE_HEADER};
use crate::ports::{CustomerRepository, ProcessedWebhookStore};

use super::dto::{AckResponse, ErrorResponse};

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Shared state for the webhook routes.
#[derive(Clone)]
pub struct WebhookAppState {
    pub verifier: SignatureVerifier,
    pub customers: Arc<dyn CustomerRepository>,
    pub processed: Arc<dyn ProcessedWebhookStore>,
    pub orchestrator: Arc<PaymentOrchestrator>,
}

impl WebhookAppState {
    pub fn webhook_handler(&self) -> HandleSubscriptionWebhookHandler {
        HandleSubscriptionWebhookHandler::new(
            self.verifier.clone(),
            self.customers.clone(),
            self.processed.clone(),
            self.orchestrator.clone(),
        )
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Handlers
// ════════════════════════════════════════════════════════════════════════════════

/// POST /webhook
///
/// The body is taken as raw bytes so the signature is checked against
/// exactly what the provider signed.
pub async fn handle_subscription_webhook(
    State(state): State<WebhookAppState>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Result<Json<AckResponse>, WebhookApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let cmd = HandleSubscriptionWebhookCommand {
        body: body.to_vec(),
        signature,
    };

    let result = state.webhook_handler().handle(cmd).await?;
    tracing::info!(
        purchase_id = %result.purchase_id,
        finalized = result.finalized,
        "Subscription webhook processed"
    );
    Ok(Json(AckResponse::ok()))
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// Converts webhook errors to the status codes the provider acts on.
pub struct WebhookApiError(WebhookError);

impl From<WebhookError> for WebhookApiError {
    fn from(err: WebhookError) -> Self {
        Self(err)
    }
}

impl IntoResponse for WebhookApiError {
    fn into_response(self) -> Response {
        let status = self.0.status_code();

        if status == StatusCode::OK {
            tracing::info!(reason = %self.0, "Webhook acknowledged without processing");
            return (status, Json(AckResponse::ignored())).into_response();
        }

        let code = match &self.0 {
            WebhookError::MissingSignature => "MISSING_SIGNATURE",
            WebhookError::InvalidSignature => "INVALID_SIGNATURE",
            WebhookError::ParseError(_) => "MALFORMED_EVENT",
            WebhookError::CustomerNotFound(_) => "CUSTOMER_NOT_FOUND",
            WebhookError::Processing(_) => "PROCESSING_FAILED",
            WebhookError::Storage(_) => "STORAGE_ERROR",
            WebhookError::Ignored(_) | WebhookError::Duplicate => "IGNORED",
        };

        if status.is_server_error() {
            tracing::error!(error = %self.0, "Webhook processing failed, sender will retry");
        } else {
            tracing::warn!(error = %self.0, "Webhook rejected");
        }

        (status, Json(ErrorResponse::new(code, self.0.to_string()))).into_response()
    }
}
