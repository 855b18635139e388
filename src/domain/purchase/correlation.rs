//! Invoice correlation: mapping external invoices back to local purchases.
//!
//! Every backend echoes back a payload we attached when the invoice was
//! created. String-payload backends get `purchaseId=<id>&customerId=<id>&username=<name>`;
//! map-payload backends get the same keys as metadata entries. Readers must
//! tolerate any key order and extra keys, and the legacy bare-id forms.

use std::collections::HashMap;
use thiserror::Error;

use crate::domain::foundation::{CustomerId, PurchaseId};

const PURCHASE_ID_KEY: &str = "purchaseId";
const CUSTOMER_ID_KEY: &str = "customerId";
const USERNAME_KEY: &str = "username";

/// Failure to recover a purchase id from an invoice payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CorrelationError {
    #[error("payload carries no purchase id")]
    MissingPurchaseId,

    #[error("purchase id '{0}' is not a number")]
    InvalidPurchaseId(String),
}

/// Data attached to an external invoice so its callback can be correlated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackPayload {
    pub purchase_id: PurchaseId,
    pub customer_id: Option<CustomerId>,
    /// Buyer's chat handle, stamped on the provisioned account for audit.
    pub username: Option<String>,
}

impl CallbackPayload {
    pub fn new(purchase_id: PurchaseId) -> Self {
        Self {
            purchase_id,
            customer_id: None,
            username: None,
        }
    }

    pub fn with_customer(mut self, customer_id: CustomerId) -> Self {
        self.customer_id = Some(customer_id);
        self
    }

    pub fn with_username(mut self, username: Option<String>) -> Self {
        self.username = username.filter(|u| !u.is_empty());
        self
    }

    /// Encodes as `key=value` pairs joined by `&`.
    pub fn encode(&self) -> String {
        let mut parts = vec![format!("{}={}", PURCHASE_ID_KEY, self.purchase_id)];
        if let Some(customer_id) = self.customer_id {
            parts.push(format!("{}={}", CUSTOMER_ID_KEY, customer_id));
        }
        if let Some(username) = &self.username {
            parts.push(format!("{}={}", USERNAME_KEY, sanitize(username)));
        }
        parts.join("&")
    }

    /// Parses a string payload.
    ///
    /// Accepts a bare numeric id as well, which is what in-chat invoices carry.
    pub fn parse(payload: &str) -> Result<Self, CorrelationError> {
        let payload = payload.trim();
        if !payload.contains('=') {
            return parse_purchase_id(payload).map(Self::new);
        }

        let fields: HashMap<String, String> = payload
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
            .collect();
        Self::from_metadata(&fields)
    }

    /// Metadata map for map-payload backends.
    pub fn to_metadata(&self) -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert(PURCHASE_ID_KEY.to_string(), self.purchase_id.to_string());
        if let Some(customer_id) = self.customer_id {
            map.insert(CUSTOMER_ID_KEY.to_string(), customer_id.to_string());
        }
        if let Some(username) = &self.username {
            map.insert(USERNAME_KEY.to_string(), username.clone());
        }
        map
    }

    /// Reads a metadata map. Unknown keys are ignored.
    pub fn from_metadata(map: &HashMap<String, String>) -> Result<Self, CorrelationError> {
        let raw = map
            .get(PURCHASE_ID_KEY)
            .or_else(|| map.get("purchase_id"))
            .ok_or(CorrelationError::MissingPurchaseId)?;
        let purchase_id = parse_purchase_id(raw)?;

        let customer_id = map
            .get(CUSTOMER_ID_KEY)
            .and_then(|v| v.parse::<CustomerId>().ok());
        let username = map.get(USERNAME_KEY).cloned();

        Ok(Self {
            purchase_id,
            customer_id,
            username: username.filter(|u| !u.is_empty()),
        })
    }
}

fn parse_purchase_id(raw: &str) -> Result<PurchaseId, CorrelationError> {
    if raw.is_empty() {
        return Err(CorrelationError::MissingPurchaseId);
    }
    raw.parse::<PurchaseId>()
        .map_err(|_| CorrelationError::InvalidPurchaseId(raw.to_string()))
}

fn sanitize(value: &str) -> String {
    value.replace(['&', '='], "_")
}

/// Backend invoice status normalized to the three states reconciliation acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvoiceStatus {
    Paid,
    Cancelled,
    Pending,
}

impl InvoiceStatus {
    /// Crypto invoices report `active`, `paid` or `expired`.
    pub fn from_crypto(status: &str) -> Self {
        match status {
            "paid" => InvoiceStatus::Paid,
            "expired" => InvoiceStatus::Cancelled,
            _ => InvoiceStatus::Pending,
        }
    }

    /// Gateway payments report a status word plus a `paid` flag.
    pub fn from_gateway(status: &str, paid: bool) -> Self {
        if status == "canceled" || status == "cancelled" {
            return InvoiceStatus::Cancelled;
        }
        if paid || status == "succeeded" {
            return InvoiceStatus::Paid;
        }
        InvoiceStatus::Pending
    }
}
