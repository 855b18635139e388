//! Application configuration module
//!
//! Type-safe configuration loaded from environment variables with the
//! `config` and `dotenvy` crates. Variables carry the `VPN_SHOP` prefix and
//! nested keys are separated by double underscores.
//!
//! # Example
//!
//! ```no_run
//! use vpn_shop::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//! ```

mod database;
mod error;
mod panel;
mod payment;
mod plans;
mod scheduler;
mod server;
mod telegram;

pub use database::DatabaseConfig;
pub use error::{ConfigError, ValidationError};
pub use panel::{PanelConfig, PanelMode};
pub use payment::{
    CryptoConfig, GatewayConfig, PaymentConfig, StarsConfig, SubscriptionWebhookConfig,
};
pub use plans::PlansConfig;
pub use scheduler::SchedulerConfig;
pub use server::{Environment, ServerConfig};
pub use telegram::TelegramConfig;

use serde::Deserialize;

/// Root application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    pub database: DatabaseConfig,

    #[serde(default)]
    pub payment: PaymentConfig,

    pub panel: PanelConfig,

    pub telegram: TelegramConfig,

    #[serde(default)]
    pub plans: PlansConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// 1. Loads `.env` if present
    /// 2. Reads variables with the `VPN_SHOP` prefix
    /// 3. Splits nested keys on `__`
    ///
    /// - `VPN_SHOP__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `VPN_SHOP__PAYMENT__CRYPTO__TOKEN=...` -> `payment.crypto.token = ...`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a required variable is missing or a value
    /// cannot be parsed.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("VPN_SHOP")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate every section.
    ///
    /// # Errors
    ///
    /// Returns the first `ValidationError` found.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.database.validate()?;
        self.payment.validate()?;
        self.panel.validate()?;
        self.telegram.validate()?;
        self.plans.validate()?;
        self.scheduler.validate()?;
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}
