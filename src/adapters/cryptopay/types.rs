//! Wire types for the crypto invoice API.

use serde::{Deserialize, Serialize};

/// Every response is wrapped as `{ "ok": bool, "result": T }`.
#[derive(Debug, Deserialize)]
pub(super) struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    #[serde(default)]
    pub error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ApiErrorBody {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct CreateInvoiceBody<'a> {
    pub currency_type: &'static str,
    pub fiat: &'a str,
    pub accepted_assets: &'a str,
    /// Decimal string, as the API expects.
    pub amount: String,
    pub description: &'a str,
    pub payload: String,
    pub paid_btn_name: &'static str,
    pub paid_btn_url: &'a str,
}

#[derive(Debug, Deserialize)]
pub(super) struct InvoiceItem {
    pub invoice_id: i64,
    pub status: String,
    #[serde(default)]
    pub bot_invoice_url: Option<String>,
    #[serde(default)]
    pub pay_url: Option<String>,
    #[serde(default)]
    pub payload: Option<String>,
}

impl InvoiceItem {
    /// Link shown to the buyer; older API versions only return `pay_url`.
    pub fn link(&self) -> Option<&str> {
        self.bot_invoice_url
            .as_deref()
            .or(self.pay_url.as_deref())
            .filter(|u| !u.is_empty())
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct InvoiceList {
    #[serde(default)]
    pub items: Vec<InvoiceItem>,
}
