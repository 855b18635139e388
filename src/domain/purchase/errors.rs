//! Purchase-lifecycle error types.
//!
//! | Error | Retryable |
//! |-------|-----------|
//! | PurchaseNotFound | no |
//! | CustomerNotFound | no |
//! | InvalidTransition | no |
//! | InvoiceCreationFailed | yes |
//! | ProvisioningFailed | yes |
//! | BackendUnavailable | no |
//! | ValidationFailed | no |
//! | Infrastructure | yes |

use crate::domain::foundation::{
    CustomerId, DomainError, ErrorCode, PurchaseId, TelegramId, ValidationError,
};

use super::{BackendKind, PurchaseStatus};

/// Errors raised by the payment orchestrator and its callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PurchaseError {
    /// Purchase row does not exist.
    PurchaseNotFound(PurchaseId),

    /// Customer row does not exist.
    CustomerNotFound(CustomerLookup),

    /// Operation is not legal from the purchase's current status.
    InvalidTransition {
        purchase_id: PurchaseId,
        current: PurchaseStatus,
        attempted: PurchaseStatus,
    },

    /// External invoice could not be created; the row stays in `new`.
    InvoiceCreationFailed {
        purchase_id: PurchaseId,
        reason: String,
    },

    /// The VPN panel refused or failed to create/extend the account.
    ProvisioningFailed(String),

    /// No adapter is configured for the requested backend.
    BackendUnavailable(BackendKind),

    /// Input rejected before any write.
    ValidationFailed { field: String, message: String },

    /// Repository or other infrastructure failure.
    Infrastructure(String),
}

/// How a missing customer was looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustomerLookup {
    ById(CustomerId),
    ByTelegramId(TelegramId),
}

impl PurchaseError {
    pub fn purchase_not_found(id: PurchaseId) -> Self {
        PurchaseError::PurchaseNotFound(id)
    }

    pub fn customer_not_found(id: CustomerId) -> Self {
        PurchaseError::CustomerNotFound(CustomerLookup::ById(id))
    }

    pub fn customer_not_found_for_telegram(id: TelegramId) -> Self {
        PurchaseError::CustomerNotFound(CustomerLookup::ByTelegramId(id))
    }

    pub fn invalid_transition(
        purchase_id: PurchaseId,
        current: PurchaseStatus,
        attempted: PurchaseStatus,
    ) -> Self {
        PurchaseError::InvalidTransition {
            purchase_id,
            current,
            attempted,
        }
    }

    pub fn invoice_creation_failed(purchase_id: PurchaseId, reason: impl Into<String>) -> Self {
        PurchaseError::InvoiceCreationFailed {
            purchase_id,
            reason: reason.into(),
        }
    }

    pub fn provisioning_failed(reason: impl Into<String>) -> Self {
        PurchaseError::ProvisioningFailed(reason.into())
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        PurchaseError::ValidationFailed {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn infrastructure(message: impl Into<String>) -> Self {
        PurchaseError::Infrastructure(message.into())
    }

    /// Returns the error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            PurchaseError::PurchaseNotFound(_) => ErrorCode::PurchaseNotFound,
            PurchaseError::CustomerNotFound(_) => ErrorCode::CustomerNotFound,
            PurchaseError::InvalidTransition { .. } => ErrorCode::InvalidStateTransition,
            PurchaseError::InvoiceCreationFailed { .. } => ErrorCode::InvoiceCreationFailed,
            PurchaseError::ProvisioningFailed(_) => ErrorCode::ProvisioningFailed,
            PurchaseError::BackendUnavailable(_) => ErrorCode::BackendUnavailable,
            PurchaseError::ValidationFailed { .. } => ErrorCode::ValidationFailed,
            PurchaseError::Infrastructure(_) => ErrorCode::DatabaseError,
        }
    }

    /// Returns a log-friendly error message.
    pub fn message(&self) -> String {
        match self {
            PurchaseError::PurchaseNotFound(id) => format!("Purchase {} not found", id),
            PurchaseError::CustomerNotFound(CustomerLookup::ById(id)) => {
                format!("Customer {} not found", id)
            }
            PurchaseError::CustomerNotFound(CustomerLookup::ByTelegramId(id)) => {
                format!("Customer with telegram id {} not found", id)
            }
            PurchaseError::InvalidTransition {
                purchase_id,
                current,
                attempted,
            } => format!(
                "Purchase {} cannot move from {} to {}",
                purchase_id, current, attempted
            ),
            PurchaseError::InvoiceCreationFailed {
                purchase_id,
                reason,
            } => format!(
                "Invoice creation failed for purchase {} (left in new): {}",
                purchase_id, reason
            ),
            PurchaseError::ProvisioningFailed(reason) => {
                format!("Account provisioning failed: {}", reason)
            }
            PurchaseError::BackendUnavailable(kind) => {
                format!("Payment backend '{}' is not configured", kind)
            }
            PurchaseError::ValidationFailed { field, message } => {
                format!("Validation failed for '{}': {}", field, message)
            }
            PurchaseError::Infrastructure(msg) => format!("Error: {}", msg),
        }
    }

    /// Returns true if the caller may retry the same request later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PurchaseError::InvoiceCreationFailed { .. }
                | PurchaseError::ProvisioningFailed(_)
                | PurchaseError::Infrastructure(_)
        )
    }
}

impl std::fmt::Display for PurchaseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for PurchaseError {}

impl From<DomainError> for PurchaseError {
    fn from(err: DomainError) -> Self {
        match err.code {
            ErrorCode::ValidationFailed => PurchaseError::ValidationFailed {
                field: err.details.get("field").cloned().unwrap_or_default(),
                message: err.message,
            },
            _ => PurchaseError::Infrastructure(err.to_string()),
        }
    }
}

impl From<ValidationError> for PurchaseError {
    fn from(err: ValidationError) -> Self {
        let field = match &err {
            ValidationError::EmptyField { field }
            | ValidationError::OutOfRange { field, .. }
            | ValidationError::InvalidFormat { field, .. } => field.clone(),
        };
        PurchaseError::ValidationFailed {
            field,
            message: err.to_string(),
        }
    }
}
