//! VPN Shop - purchase lifecycle for a chat-sold VPN subscription.
//!
//! A buyer picks a plan, pays on one of several backends (crypto invoices,
//! a fiat gateway, in-chat payments or a recurring subscription provider),
//! and gets a provisioned VPN account whose expiry is extended once the
//! payment is confirmed. Confirmation arrives either from a reconciliation
//! poller or from a signed webhook; both funnel into the same
//! [`application::PaymentOrchestrator`].

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
