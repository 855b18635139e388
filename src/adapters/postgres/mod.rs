//! PostgreSQL adapters - Database implementations for the ledger ports.
//!
//! - `PostgresPurchaseRepository` - Purchase Ledger with conditional status writes
//! - `PostgresCustomerRepository` - Customer Directory
//! - `PostgresReferralRepository` - Referral Ledger
//! - `PostgresProcessedWebhookStore` - Webhook redelivery tracking

mod customer_repository;
mod processed_webhook_store;
mod purchase_repository;
mod referral_repository;

pub use customer_repository::PostgresCustomerRepository;
pub use processed_webhook_store::PostgresProcessedWebhookStore;
pub use purchase_repository::PostgresPurchaseRepository;
pub use referral_repository::PostgresReferralRepository;
