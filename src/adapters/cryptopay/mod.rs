//! Crypto invoice backend.
//!
//! Creates fiat-denominated invoices payable in stablecoin and reads their
//! status back in bulk for the reconciliation poller.

mod client;
mod types;

pub use client::{CryptoPayClient, CryptoPayConfig};
