//! VPN panel adapter.
//!
//! Accounts are keyed by the buyer's chat id. A paid purchase either creates
//! the account or pushes its expiry forward.

mod client;
mod types;

pub use client::{PanelClient, PanelConfig};
