//! Payment backend discriminator.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::ValidationError;

/// Which payment backend a purchase was created on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Cryptocurrency invoices, reconciled by bulk polling.
    Crypto,

    /// Fiat payment gateway, reconciled by polling one payment at a time.
    Gateway,

    /// In-chat micropayments, confirmed by the chat client's success callback.
    InChat,

    /// Recurring subscription provider that pushes a signed webhook after charging.
    SubscriptionWebhook,
}

impl BackendKind {
    pub const ALL: [BackendKind; 4] = [
        BackendKind::Crypto,
        BackendKind::Gateway,
        BackendKind::InChat,
        BackendKind::SubscriptionWebhook,
    ];

    /// Storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Crypto => "crypto",
            BackendKind::Gateway => "gateway",
            BackendKind::InChat => "in_chat",
            BackendKind::SubscriptionWebhook => "subscription_webhook",
        }
    }

    /// Currency purchases on this backend are priced in.
    pub fn default_currency(&self) -> &'static str {
        match self {
            BackendKind::InChat => "STARS",
            _ => "RUB",
        }
    }

    /// True for backends whose invoices are reconciled by a poller.
    pub fn is_polled(&self) -> bool {
        matches!(self, BackendKind::Crypto | BackendKind::Gateway)
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BackendKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| {
                ValidationError::invalid_format("backend_kind", format!("unknown backend '{}'", s))
            })
    }
}
