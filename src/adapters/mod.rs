//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the application layer to external systems:
//! - `postgres` / `memory` - ledger and directory storage
//! - `cryptopay` / `gateway` / `telegram` / `subscription_link` - payment backends
//! - `panel` - VPN account provisioning
//! - `telegram` - buyer notifications (same client as the in-chat backend)
//! - `translation` - message catalog
//! - `cache` - TTL cache in front of customer reads
//! - `http` - inbound webhook and health check

pub mod cache;
pub mod cryptopay;
pub mod gateway;
pub mod http;
pub mod memory;
pub mod panel;
pub mod postgres;
pub mod subscription_link;
pub mod telegram;
pub mod translation;

pub use cache::TtlCache;
pub use cryptopay::{CryptoPayClient, CryptoPayConfig};
pub use gateway::{GatewayClient, GatewayConfig};
pub use panel::{PanelClient, PanelConfig};
pub use subscription_link::SubscriptionLinkBackend;
pub use telegram::{TelegramBotClient, TelegramConfig};
pub use translation::FileMessageCatalog;
