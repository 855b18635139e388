//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Ledger Ports
//!
//! - `PurchaseRepository` - Purchase Ledger, including the conditional writes
//! - `CustomerRepository` - Customer Directory
//! - `ReferralRepository` - Referral Ledger
//!
//! ## External Service Ports
//!
//! - `SubscriptionProvisioner` - VPN panel account create-or-extend
//! - `PaymentBackend` - Invoice creation, one per backend
//! - `InvoiceLookup` - Invoice status reads for polled backends
//! - `Notifier` / `MessageCatalog` - Buyer-facing messages
//!
//! ## Webhook Ports
//!
//! - `ProcessedWebhookStore` - Redelivery tracking for the subscription webhook

mod customer_repository;
mod invoice_lookup;
mod message_catalog;
mod notifier;
mod payment_backend;
mod processed_webhook_store;
mod purchase_repository;
mod referral_repository;
mod subscription_provisioner;

pub use customer_repository::CustomerRepository;
pub use invoice_lookup::{ExternalInvoice, InvoiceLookup};
pub use message_catalog::MessageCatalog;
pub use notifier::{Notification, NotificationAction, Notifier, NotifierError};
pub use payment_backend::{
    BackendError, BackendErrorCode, BuyerIdentity, CreatedInvoice, InvoiceRequest, PaymentBackend,
};
pub use processed_webhook_store::{ProcessedWebhookStore, SaveResult};
pub use purchase_repository::PurchaseRepository;
pub use referral_repository::ReferralRepository;
pub use subscription_provisioner::{ProvisionError, ProvisionRequest, ProvisionedAccount, SubscriptionProvisioner};
