//! Payment backend port - invoice creation on an external payment system.
//!
//! Each backend gets an explicit `InvoiceRequest` carrying everything it
//! needs, including the buyer's identity for the post-payment callback.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{DomainError, ErrorCode};
use crate::domain::purchase::{BackendKind, CallbackPayload, InvoiceCorrelation};

/// Port for creating invoices on one payment backend.
#[async_trait]
pub trait PaymentBackend: Send + Sync {
    /// The backend this adapter serves.
    fn kind(&self) -> BackendKind;

    /// Create an external invoice and return its correlation and pay URL.
    async fn create_invoice(&self, request: InvoiceRequest) -> Result<CreatedInvoice, BackendError>;
}

/// Who is paying, as far as the backend needs to know.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuyerIdentity {
    /// Chat handle, if the buyer has one.
    pub username: Option<String>,
}

impl BuyerIdentity {
    pub fn username(username: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
        }
    }
}

/// Request to create an invoice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceRequest {
    pub amount: i64,
    pub currency: String,
    pub months: i32,
    /// Short product name, shown by backends that render a checkout card.
    pub title: String,
    pub description: String,
    /// Echoed back by the backend; carries the purchase id.
    pub payload: CallbackPayload,
    pub buyer: BuyerIdentity,
}

/// Invoice as created by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedInvoice {
    pub correlation: InvoiceCorrelation,
    pub pay_url: String,
}

/// Errors from payment backend operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendError {
    pub code: BackendErrorCode,
    pub message: String,
}

impl BackendError {
    pub fn new(code: BackendErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(BackendErrorCode::NetworkError, message)
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(BackendErrorCode::Rejected, message)
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(BackendErrorCode::InvalidResponse, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(BackendErrorCode::RateLimitExceeded, message)
    }

    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for BackendError {}

impl From<BackendError> for DomainError {
    fn from(err: BackendError) -> Self {
        DomainError::new(ErrorCode::BackendUnavailable, err.to_string())
    }
}

/// Payment backend error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendErrorCode {
    /// Connection failure or timeout.
    NetworkError,

    /// Backend answered 429.
    RateLimitExceeded,

    /// Backend refused the request (non-2xx or `ok: false`).
    Rejected,

    /// Backend answered with something we could not decode.
    InvalidResponse,

    /// Referenced invoice does not exist.
    NotFound,
}

impl BackendErrorCode {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BackendErrorCode::NetworkError | BackendErrorCode::RateLimitExceeded
        )
    }
}

impl std::fmt::Display for BackendErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BackendErrorCode::NetworkError => "network_error",
            BackendErrorCode::RateLimitExceeded => "rate_limit_exceeded",
            BackendErrorCode::Rejected => "rejected",
            BackendErrorCode::InvalidResponse => "invalid_response",
            BackendErrorCode::NotFound => "not_found",
        };
        write!(f, "{}", s)
    }
}
