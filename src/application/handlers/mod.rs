//! Command and query handlers at the edges of the purchase lifecycle.

pub mod customer;
pub mod webhook;

pub use customer::{
    GetCustomerHandler, RegisterCustomerCommand, RegisterCustomerHandler, RegisterCustomerResult,
};
pub use webhook::{
    HandleSubscriptionWebhookCommand, HandleSubscriptionWebhookHandler,
    HandleSubscriptionWebhookResult,
};
