//! Subscription-provider checkout link.
//!
//! The recurring provider hosts its own checkout page and reports charges
//! through the signed webhook, so "creating an invoice" is just handing out
//! the configured link.

use async_trait::async_trait;

use crate::domain::purchase::{BackendKind, InvoiceCorrelation};
use crate::ports::{BackendError, CreatedInvoice, InvoiceRequest, PaymentBackend};

pub struct SubscriptionLinkBackend {
    checkout_url: String,
}

impl SubscriptionLinkBackend {
    pub fn new(checkout_url: impl Into<String>) -> Self {
        Self {
            checkout_url: checkout_url.into(),
        }
    }
}

#[async_trait]
impl PaymentBackend for SubscriptionLinkBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::SubscriptionWebhook
    }

    async fn create_invoice(&self, _request: InvoiceRequest) -> Result<CreatedInvoice, BackendError> {
        if self.checkout_url.is_empty() {
            return Err(BackendError::rejected("subscription checkout url is not configured"));
        }
        Ok(CreatedInvoice {
            correlation: InvoiceCorrelation::None,
            pay_url: self.checkout_url.clone(),
        })
    }
}
