//! Application layer - services and handlers.
//!
//! Orchestrates the domain through the ports. Background loops (pollers,
//! expiration notifier) live here too; `main` only spawns them.

pub mod expiration;
pub mod handlers;
pub mod messages;
pub mod payment;
pub mod reconciliation;
pub mod retention;

#[cfg(test)]
pub(crate) mod testing;

pub use expiration::{
    spawn_expiration_notifier, ExpirationConfig, ExpirationNotifier, ExpirationReport,
};
pub use handlers::{
    GetCustomerHandler, HandleSubscriptionWebhookCommand, HandleSubscriptionWebhookHandler,
    HandleSubscriptionWebhookResult, RegisterCustomerCommand, RegisterCustomerHandler,
    RegisterCustomerResult,
};
pub use payment::{
    CancelOutcome, CreatePurchaseCommand, CreatePurchaseResult, FinalizeCommand, FinalizeOutcome,
    OrchestratorSettings, PaymentOrchestrator,
};
pub use reconciliation::{spawn_poller, InvoicePoller, PollReport, PollerConfig};
pub use retention::WebhookRetention;
