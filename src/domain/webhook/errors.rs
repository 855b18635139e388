//! Webhook error types, with HTTP status mapping and retryability.

use axum::http::StatusCode;
use thiserror::Error;

use crate::domain::foundation::TelegramId;

/// Errors that occur while receiving a subscription webhook.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// No `signature` header on the request.
    #[error("Missing signature")]
    MissingSignature,

    /// Signature did not match the body.
    #[error("Invalid signature")]
    InvalidSignature,

    /// Body is not a well-formed event.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Event was intentionally ignored (not an error condition).
    #[error("Event ignored: {0}")]
    Ignored(String),

    /// Identical body was already processed successfully.
    #[error("Duplicate delivery")]
    Duplicate,

    /// The buyer named in the event is not in the Customer Directory.
    #[error("Customer with telegram id {0} not found")]
    CustomerNotFound(TelegramId),

    /// Purchase creation or finalize failed.
    #[error("Processing failed: {0}")]
    Processing(String),

    /// Processed-delivery store failed.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl WebhookError {
    /// Returns true if the sender should redeliver this webhook.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WebhookError::CustomerNotFound(_)
                | WebhookError::Processing(_)
                | WebhookError::Storage(_)
        )
    }

    /// Maps the error to the HTTP status returned to the sender.
    ///
    /// - 2xx: acknowledged, no retry
    /// - 4xx: rejected, no retry
    /// - 5xx: sender retries
    pub fn status_code(&self) -> StatusCode {
        match self {
            WebhookError::MissingSignature | WebhookError::InvalidSignature => {
                StatusCode::UNAUTHORIZED
            }

            WebhookError::ParseError(_) => StatusCode::BAD_REQUEST,

            WebhookError::Ignored(_) | WebhookError::Duplicate => StatusCode::OK,

            WebhookError::CustomerNotFound(_)
            | WebhookError::Processing(_)
            | WebhookError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
