//! Subscription provisioner port - the external VPN panel.
//!
//! Create-or-extend is safe to call repeatedly: an existing account for the
//! same chat identity is extended, never replaced.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::foundation::{CustomerId, TelegramId, Timestamp};

/// What to grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionRequest {
    pub customer_id: CustomerId,
    pub telegram_id: TelegramId,
    pub traffic_limit_bytes: i64,
    pub duration_days: i64,
    /// Chat handle stamped on the account for audit.
    pub username: Option<String>,
}

/// Account state after provisioning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionedAccount {
    pub subscription_link: String,
    pub expire_at: Timestamp,
}

/// Failures talking to the panel.
#[derive(Debug, Clone, Error)]
pub enum ProvisionError {
    #[error("panel request failed: {0}")]
    Network(String),

    #[error("panel returned status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("panel response could not be decoded: {0}")]
    InvalidResponse(String),

    #[error("access of {0} days cannot be represented as an expiry")]
    InvalidDuration(i64),
}

#[async_trait]
pub trait SubscriptionProvisioner: Send + Sync {
    async fn create_or_update_account(
        &self,
        request: ProvisionRequest,
    ) -> Result<ProvisionedAccount, ProvisionError>;
}
