//! In-memory ledger adapters.
//!
//! Used by tests and by local runs without a database. State lives behind
//! `tokio::sync::RwLock`, so the conditional writes are atomic per store.

mod customer_repository;
mod processed_webhook_store;
mod purchase_repository;
mod referral_repository;

pub use customer_repository::InMemoryCustomerRepository;
pub use processed_webhook_store::InMemoryProcessedWebhookStore;
pub use purchase_repository::InMemoryPurchaseRepository;
pub use referral_repository::InMemoryReferralRepository;
