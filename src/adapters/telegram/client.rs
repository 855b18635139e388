//! Bot API client.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::domain::purchase::{BackendKind, InvoiceCorrelation};
use crate::ports::{
    BackendError, CreatedInvoice, InvoiceRequest, Notification, NotificationAction, Notifier,
    NotifierError, PaymentBackend,
};

use super::types::{
    ApiResponse, CreateInvoiceLinkBody, InlineKeyboardButton, InlineKeyboardMarkup,
    LabeledPrice, SendMessageBody,
};

/// Currency code of in-chat stars.
const STARS_CURRENCY: &str = "XTR";

/// Bot API configuration.
#[derive(Clone)]
pub struct TelegramConfig {
    token: SecretString,
    base_url: String,
    timeout: Duration,
}

impl TelegramConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: SecretString::new(token.into()),
            base_url: "https://api.telegram.org".to_string(),
            timeout: Duration::from_secs(10),
        }
    }

    /// Set a custom API base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Failure talking to the bot API, before it is mapped onto a port error.
#[derive(Debug)]
enum CallError {
    Network(String),
    Rejected(String),
    InvalidResponse(String),
}

/// Bot API client.
pub struct TelegramBotClient {
    config: TelegramConfig,
    http_client: reqwest::Client,
}

impl TelegramBotClient {
    pub fn new(config: TelegramConfig) -> Result<Self, reqwest::Error> {
        let http_client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            config,
            http_client,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.config.base_url,
            self.config.token.expose_secret(),
            method
        )
    }

    /// The bot API answers errors with a JSON body and a 4xx status, so the
    /// body is decoded before the status is considered.
    async fn call<B: Serialize, T: DeserializeOwned>(
        &self,
        method: &str,
        body: &B,
    ) -> Result<T, CallError> {
        let response = self
            .http_client
            .post(self.method_url(method))
            .json(body)
            .send()
            .await
            .map_err(|e| CallError::Network(e.to_string()))?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        let parsed: ApiResponse<T> = match serde_json::from_str(&text) {
            Ok(parsed) => parsed,
            Err(e) if status.is_success() => return Err(CallError::InvalidResponse(e.to_string())),
            Err(_) => {
                tracing::error!(%status, error = %text, method, "Bot API request failed");
                return Err(CallError::Rejected(format!("HTTP {}", status)));
            }
        };

        if !parsed.ok {
            let reason = parsed.description.unwrap_or_else(|| format!("HTTP {}", status));
            return Err(CallError::Rejected(reason));
        }
        parsed
            .result
            .ok_or_else(|| CallError::InvalidResponse(format!("{} returned no result", method)))
    }
}

fn keyboard(action: &NotificationAction) -> InlineKeyboardMarkup {
    let button = match action {
        NotificationAction::Url { label, url } => InlineKeyboardButton {
            text: label.clone(),
            url: Some(url.clone()),
            callback_data: None,
        },
        NotificationAction::Callback { label, data } => InlineKeyboardButton {
            text: label.clone(),
            url: None,
            callback_data: Some(data.clone()),
        },
    };
    InlineKeyboardMarkup {
        inline_keyboard: vec![vec![button]],
    }
}

#[async_trait]
impl Notifier for TelegramBotClient {
    async fn send(&self, notification: Notification) -> Result<(), NotifierError> {
        let body = SendMessageBody {
            chat_id: notification.chat_id.as_i64(),
            text: &notification.text,
            parse_mode: "HTML",
            reply_markup: notification.action.as_ref().map(keyboard),
        };

        self.call::<_, serde_json::Value>("sendMessage", &body)
            .await
            .map(|_| ())
            .map_err(|e| match e {
                CallError::Network(msg) | CallError::InvalidResponse(msg) => {
                    NotifierError::Delivery(msg)
                }
                CallError::Rejected(msg) => NotifierError::Rejected(msg),
            })
    }
}

#[async_trait]
impl PaymentBackend for TelegramBotClient {
    fn kind(&self) -> BackendKind {
        BackendKind::InChat
    }

    async fn create_invoice(&self, request: InvoiceRequest) -> Result<CreatedInvoice, BackendError> {
        // The success callback carries this payload back verbatim; only the id is needed.
        let body = CreateInvoiceLinkBody {
            title: request.title.clone(),
            description: request.description,
            payload: request.payload.purchase_id.to_string(),
            currency: STARS_CURRENCY,
            prices: vec![LabeledPrice {
                label: request.title,
                amount: request.amount,
            }],
        };

        let link: String = self
            .call("createInvoiceLink", &body)
            .await
            .map_err(|e| match e {
                CallError::Network(msg) => BackendError::network(msg),
                CallError::Rejected(msg) => BackendError::rejected(msg),
                CallError::InvalidResponse(msg) => BackendError::invalid_response(msg),
            })?;

        Ok(CreatedInvoice {
            correlation: InvoiceCorrelation::None,
            pay_url: link,
        })
    }
}
