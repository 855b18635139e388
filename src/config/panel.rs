//! VPN panel configuration

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use uuid::Uuid;

use super::error::{require_http_url, ValidationError};

#[derive(Debug, Clone, Deserialize)]
pub struct PanelConfig {
    pub url: String,

    pub token: SecretString,

    /// `local` when the panel is reached over loopback, bypassing its proxy
    #[serde(default)]
    pub mode: PanelMode,

    /// Comma-separated inbound UUIDs for new accounts; empty means all
    #[serde(default)]
    pub inbound_uuids: String,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PanelMode {
    #[default]
    Remote,
    Local,
}

impl PanelConfig {
    pub fn is_local(&self) -> bool {
        self.mode == PanelMode::Local
    }

    pub fn inbounds(&self) -> Result<Vec<Uuid>, ValidationError> {
        self.inbound_uuids
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<Uuid>()
                    .map_err(|_| ValidationError::InvalidInboundUuid(s.to_string()))
            })
            .collect()
    }

    /// Validate panel configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_http_url(&self.url, "PANEL__URL")?;
        if self.token.expose_secret().is_empty() {
            return Err(ValidationError::MissingRequired("PANEL__TOKEN"));
        }
        if self.timeout_secs == 0 {
            return Err(ValidationError::InvalidTimeout);
        }
        self.inbounds()?;
        Ok(())
    }
}

fn default_timeout() -> u64 {
    10
}
