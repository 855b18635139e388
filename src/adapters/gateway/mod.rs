//! Fiat payment gateway backend.
//!
//! Payments are created with a redirect confirmation and read back one at a
//! time by the reconciliation poller.

mod client;
mod types;

pub use client::{GatewayClient, GatewayConfig};
