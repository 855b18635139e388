//! Chat bot API adapter.
//!
//! One client serves two ports: direct messages to buyers (`Notifier`) and
//! in-chat invoice links priced in the chat's own currency (`PaymentBackend`).

mod client;
mod types;

pub use client::{TelegramBotClient, TelegramConfig};
