//! Crypto invoice API client.
//!
//! Implements both `PaymentBackend` (invoice creation) and `InvoiceLookup`
//! (bulk status reads) for `BackendKind::Crypto`.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;

use crate::domain::purchase::{BackendKind, CallbackPayload, InvoiceCorrelation, InvoiceStatus};
use crate::ports::{
    BackendError, BackendErrorCode, CreatedInvoice, ExternalInvoice, InvoiceLookup,
    InvoiceRequest, PaymentBackend,
};

use super::types::{ApiResponse, CreateInvoiceBody, InvoiceItem, InvoiceList};

const TOKEN_HEADER: &str = "Crypto-Pay-API-Token";

/// Crypto invoice API configuration.
#[derive(Clone)]
pub struct CryptoPayConfig {
    token: SecretString,
    base_url: String,
    /// Bot link behind the "return to bot" button on the paid invoice.
    return_url: String,
    fiat: String,
    accepted_assets: String,
    timeout: Duration,
}

impl CryptoPayConfig {
    pub fn new(token: impl Into<String>, return_url: impl Into<String>) -> Self {
        Self {
            token: SecretString::new(token.into()),
            base_url: "https://pay.crypt.bot/api".to_string(),
            return_url: return_url.into(),
            fiat: "RUB".to_string(),
            accepted_assets: "USDT".to_string(),
            timeout: Duration::from_secs(10),
        }
    }

    /// Set a custom API base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_accepted_assets(mut self, assets: impl Into<String>) -> Self {
        self.accepted_assets = assets.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Crypto invoice API client.
pub struct CryptoPayClient {
    config: CryptoPayConfig,
    http_client: reqwest::Client,
}

impl CryptoPayClient {
    pub fn new(config: CryptoPayConfig) -> Result<Self, BackendError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| BackendError::network(e.to_string()))?;
        Ok(Self {
            config,
            http_client,
        })
    }

    async fn read<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
        operation: &str,
    ) -> Result<T, BackendError> {
        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(BackendError::rate_limited(format!("{} throttled", operation)));
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!(%status, error = %error_text, operation, "Crypto API request failed");
            return Err(BackendError::rejected(format!("HTTP {}: {}", status, error_text)));
        }

        let body: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| BackendError::invalid_response(e.to_string()))?;

        if !body.ok {
            let name = body.error.and_then(|e| e.name).unwrap_or_default();
            return Err(BackendError::rejected(format!("{} returned ok=false {}", operation, name)));
        }
        body.result
            .ok_or_else(|| BackendError::invalid_response(format!("{} returned no result", operation)))
    }

    fn to_external(item: InvoiceItem) -> ExternalInvoice {
        let payload = CallbackPayload::parse(item.payload.as_deref().unwrap_or_default());
        ExternalInvoice {
            external_id: item.invoice_id.to_string(),
            status: InvoiceStatus::from_crypto(&item.status),
            payload,
        }
    }
}

#[async_trait]
impl PaymentBackend for CryptoPayClient {
    fn kind(&self) -> BackendKind {
        BackendKind::Crypto
    }

    async fn create_invoice(&self, request: InvoiceRequest) -> Result<CreatedInvoice, BackendError> {
        let url = format!("{}/createInvoice", self.config.base_url);
        let body = CreateInvoiceBody {
            currency_type: "fiat",
            fiat: &self.config.fiat,
            accepted_assets: &self.config.accepted_assets,
            amount: request.amount.to_string(),
            description: &request.description,
            payload: request.payload.encode(),
            paid_btn_name: "callback",
            paid_btn_url: &self.config.return_url,
        };

        let response = self
            .http_client
            .post(&url)
            .header(TOKEN_HEADER, self.config.token.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| BackendError::network(e.to_string()))?;

        let invoice: InvoiceItem = self.read(response, "createInvoice").await?;
        let link = invoice
            .link()
            .ok_or_else(|| BackendError::invalid_response("invoice has no payment link"))?
            .to_string();

        tracing::info!(invoice_id = invoice.invoice_id, "Crypto invoice created");

        Ok(CreatedInvoice {
            correlation: InvoiceCorrelation::Crypto {
                invoice_id: invoice.invoice_id,
                invoice_url: link.clone(),
            },
            pay_url: link,
        })
    }
}

#[async_trait]
impl InvoiceLookup for CryptoPayClient {
    fn kind(&self) -> BackendKind {
        BackendKind::Crypto
    }

    fn supports_bulk(&self) -> bool {
        true
    }

    async fn fetch_invoice(&self, external_id: &str) -> Result<ExternalInvoice, BackendError> {
        let mut invoices = self.fetch_invoices(&[external_id.to_string()]).await?;
        invoices.pop().ok_or_else(|| {
            BackendError::new(
                BackendErrorCode::NotFound,
                format!("invoice {} not found", external_id),
            )
        })
    }

    async fn fetch_invoices(
        &self,
        external_ids: &[String],
    ) -> Result<Vec<ExternalInvoice>, BackendError> {
        if external_ids.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/getInvoices", self.config.base_url);
        let response = self
            .http_client
            .get(&url)
            .header(TOKEN_HEADER, self.config.token.expose_secret())
            .query(&[("invoice_ids", external_ids.join(","))])
            .send()
            .await
            .map_err(|e| BackendError::network(e.to_string()))?;

        let list: InvoiceList = self.read(response, "getInvoices").await?;
        Ok(list.items.into_iter().map(Self::to_external).collect())
    }
}
