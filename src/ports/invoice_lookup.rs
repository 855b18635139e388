//! Invoice lookup port - status reads used by the reconciliation pollers.

use async_trait::async_trait;

use super::BackendError;
use crate::domain::purchase::{BackendKind, CallbackPayload, CorrelationError, InvoiceStatus};

/// An invoice as reported by its backend, with status already normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalInvoice {
    /// The backend's own id, as stored in the purchase correlation.
    pub external_id: String,
    pub status: InvoiceStatus,
    /// Decoded payload; a bad payload only skips this invoice.
    pub payload: Result<CallbackPayload, CorrelationError>,
}

/// Port for reading invoice status from one polled backend.
#[async_trait]
pub trait InvoiceLookup: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// True if `fetch_invoices` resolves many ids in one call.
    fn supports_bulk(&self) -> bool;

    /// Fetch one invoice.
    async fn fetch_invoice(&self, external_id: &str) -> Result<ExternalInvoice, BackendError>;

    /// Fetch many invoices. Unknown ids are simply absent from the result.
    async fn fetch_invoices(
        &self,
        external_ids: &[String],
    ) -> Result<Vec<ExternalInvoice>, BackendError>;
}
