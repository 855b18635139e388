//! Wire types for the bot API.

use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub(super) struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct SendMessageBody<'a> {
    pub chat_id: i64,
    pub text: &'a str,
    pub parse_mode: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_markup: Option<InlineKeyboardMarkup>,
}

#[derive(Debug, Serialize)]
pub(super) struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

#[derive(Debug, Serialize)]
pub(super) struct InlineKeyboardButton {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_data: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct LabeledPrice {
    pub label: String,
    pub amount: i64,
}

#[derive(Debug, Serialize)]
pub(super) struct CreateInvoiceLinkBody {
    pub title: String,
    pub description: String,
    pub payload: String,
    pub currency: &'static str,
    pub prices: Vec<LabeledPrice>,
}
