//! Payment backend configuration
//!
//! Each backend is switched on independently. Only enabled backends are
//! registered with the orchestrator; the rest answer `BackendUnavailable`.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::error::{require_http_url, ValidationError};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymentConfig {
    #[serde(default)]
    pub crypto: CryptoConfig,

    #[serde(default)]
    pub gateway: GatewayConfig,

    /// In-chat stars; uses the bot token from the `telegram` section
    #[serde(default)]
    pub stars: StarsConfig,

    #[serde(default)]
    pub subscription_webhook: SubscriptionWebhookConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CryptoConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_crypto_url")]
    pub url: String,

    pub token: Option<SecretString>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_gateway_url")]
    pub url: String,

    #[serde(default)]
    pub shop_id: String,

    pub secret_key: Option<SecretString>,

    /// Address fiscal receipts are issued to
    pub receipt_email: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StarsConfig {
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubscriptionWebhookConfig {
    #[serde(default)]
    pub enabled: bool,

    /// HMAC key the provider signs deliveries with
    pub secret: Option<SecretString>,

    /// Provider-hosted checkout page handed to buyers
    #[serde(default)]
    pub payment_url: String,
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: default_crypto_url(),
            token: None,
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: default_gateway_url(),
            shop_id: String::new(),
            secret_key: None,
            receipt_email: None,
        }
    }
}

fn default_crypto_url() -> String {
    "https://pay.crypt.bot/api".to_string()
}

fn default_gateway_url() -> String {
    "https://api.yookassa.ru/v3".to_string()
}

fn has_secret(secret: &Option<SecretString>) -> bool {
    secret
        .as_ref()
        .is_some_and(|s| !s.expose_secret().is_empty())
}

impl PaymentConfig {
    pub fn any_enabled(&self) -> bool {
        self.crypto.enabled
            || self.gateway.enabled
            || self.stars.enabled
            || self.subscription_webhook.enabled
    }

    /// Validate payment configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.any_enabled() {
            return Err(ValidationError::NoPaymentBackendEnabled);
        }

        if self.crypto.enabled {
            require_http_url(&self.crypto.url, "PAYMENT__CRYPTO__URL")?;
            if !has_secret(&self.crypto.token) {
                return Err(ValidationError::MissingRequired("PAYMENT__CRYPTO__TOKEN"));
            }
        }

        if self.gateway.enabled {
            require_http_url(&self.gateway.url, "PAYMENT__GATEWAY__URL")?;
            if self.gateway.shop_id.is_empty() {
                return Err(ValidationError::MissingRequired("PAYMENT__GATEWAY__SHOP_ID"));
            }
            if !has_secret(&self.gateway.secret_key) {
                return Err(ValidationError::MissingRequired("PAYMENT__GATEWAY__SECRET_KEY"));
            }
        }

        if self.subscription_webhook.enabled {
            if !has_secret(&self.subscription_webhook.secret) {
                return Err(ValidationError::MissingRequired(
                    "PAYMENT__SUBSCRIPTION_WEBHOOK__SECRET",
                ));
            }
            require_http_url(
                &self.subscription_webhook.payment_url,
                "PAYMENT__SUBSCRIPTION_WEBHOOK__PAYMENT_URL",
            )?;
        }

        Ok(())
    }
}
