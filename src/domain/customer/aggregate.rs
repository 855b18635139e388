//! Customer aggregate and its insert/patch values.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{CustomerId, TelegramId, Timestamp, ValidationError};

/// Language used when a buyer's client reports none.
pub const DEFAULT_LANGUAGE: &str = "en";

/// A buyer, identified by their chat identity.
///
/// `expire_at` in the past (or absent) means no active access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub telegram_id: TelegramId,
    pub language: String,
    pub expire_at: Option<Timestamp>,
    pub subscription_link: Option<String>,
    pub created_at: Timestamp,
}

impl Customer {
    /// True if the customer's paid access extends past `now`.
    pub fn has_active_access(&self, now: Timestamp) -> bool {
        self.expire_at.map(|at| at.is_after(&now)).unwrap_or(false)
    }

    /// Applies a patch in place. Absent fields are left untouched.
    pub fn apply(&mut self, patch: &CustomerPatch) {
        if let Some(expire_at) = patch.expire_at {
            self.expire_at = Some(expire_at);
        }
        if let Some(link) = &patch.subscription_link {
            self.subscription_link = Some(link.clone());
        }
        if let Some(language) = &patch.language {
            self.language = language.clone();
        }
    }
}

/// Insert value for the Customer Directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCustomer {
    pub telegram_id: TelegramId,
    pub language: String,
}

impl NewCustomer {
    /// Creates an insert value; an empty language falls back to the default.
    pub fn new(telegram_id: TelegramId, language: impl Into<String>) -> Self {
        let language = language.into();
        let language = if language.trim().is_empty() {
            DEFAULT_LANGUAGE.to_string()
        } else {
            language.trim().to_lowercase()
        };
        Self {
            telegram_id,
            language,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.telegram_id.as_i64() <= 0 {
            return Err(ValidationError::out_of_range(
                "telegram_id",
                1,
                i64::MAX,
                self.telegram_id.as_i64(),
            ));
        }
        Ok(())
    }

    pub fn into_customer(self, id: CustomerId, created_at: Timestamp) -> Customer {
        Customer {
            id,
            telegram_id: self.telegram_id,
            language: self.language,
            expire_at: None,
            subscription_link: None,
            created_at,
        }
    }
}

/// Typed partial update of a customer row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomerPatch {
    pub expire_at: Option<Timestamp>,
    pub subscription_link: Option<String>,
    pub language: Option<String>,
}

impl CustomerPatch {
    /// Patch recording a freshly provisioned account.
    pub fn access(expire_at: Timestamp, subscription_link: impl Into<String>) -> Self {
        Self {
            expire_at: Some(expire_at),
            subscription_link: Some(subscription_link.into()),
            language: None,
        }
    }

    pub fn language(language: impl Into<String>) -> Self {
        Self {
            language: Some(language.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.expire_at.is_none() && self.subscription_link.is_none() && self.language.is_none()
    }
}
