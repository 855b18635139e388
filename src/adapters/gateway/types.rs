//! Wire types for the payment gateway API.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub(super) struct Amount {
    pub value: String,
    pub currency: String,
}

#[derive(Debug, Serialize)]
pub(super) struct ConfirmationRequest {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub return_url: String,
}

#[derive(Debug, Serialize)]
pub(super) struct ReceiptCustomer {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub(super) struct ReceiptItem {
    pub description: String,
    pub amount: Amount,
    pub vat_code: u8,
    pub quantity: &'static str,
    pub payment_subject: &'static str,
    pub payment_mode: &'static str,
}

#[derive(Debug, Serialize)]
pub(super) struct Receipt {
    pub customer: ReceiptCustomer,
    pub items: Vec<ReceiptItem>,
}

#[derive(Debug, Serialize)]
pub(super) struct CreatePaymentBody {
    pub amount: Amount,
    pub confirmation: ConfirmationRequest,
    pub capture: bool,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt: Option<Receipt>,
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct Confirmation {
    #[serde(default)]
    pub confirmation_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct Payment {
    pub id: Uuid,
    pub status: String,
    #[serde(default)]
    pub paid: bool,
    #[serde(default)]
    pub confirmation: Option<Confirmation>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl Payment {
    pub fn confirmation_url(&self) -> Option<&str> {
        self.confirmation
            .as_ref()
            .and_then(|c| c.confirmation_url.as_deref())
            .filter(|u| !u.is_empty())
    }
}
