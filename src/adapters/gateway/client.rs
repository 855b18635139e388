//! Payment gateway client.
//!
//! Implements `PaymentBackend` and single-item `InvoiceLookup` for
//! `BackendKind::Gateway`. Status reads back off exponentially on 429.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use uuid::Uuid;

use crate::domain::purchase::{BackendKind, CallbackPayload, InvoiceCorrelation, InvoiceStatus};
use crate::ports::{
    BackendError, BackendErrorCode, CreatedInvoice, ExternalInvoice, InvoiceLookup,
    InvoiceRequest, PaymentBackend,
};

use super::types::{
    Amount, ConfirmationRequest, CreatePaymentBody, Payment, Receipt, ReceiptCustomer,
    ReceiptItem,
};

const IDEMPOTENCE_HEADER: &str = "Idempotence-Key";

/// Payment gateway configuration.
#[derive(Clone)]
pub struct GatewayConfig {
    shop_id: String,
    secret_key: SecretString,
    base_url: String,
    /// Where the buyer lands after confirming the payment.
    return_url: String,
    /// Fiscal receipt address; receipts are omitted when unset.
    receipt_email: Option<String>,
    timeout: Duration,
    max_retries: u32,
    retry_base_delay: Duration,
}

impl GatewayConfig {
    pub fn new(
        shop_id: impl Into<String>,
        secret_key: impl Into<String>,
        return_url: impl Into<String>,
    ) -> Self {
        Self {
            shop_id: shop_id.into(),
            secret_key: SecretString::new(secret_key.into()),
            base_url: "https://api.yookassa.ru/v3".to_string(),
            return_url: return_url.into(),
            receipt_email: None,
            timeout: Duration::from_secs(10),
            max_retries: 5,
            retry_base_delay: Duration::from_secs(1),
        }
    }

    /// Set a custom API base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_receipt_email(mut self, email: impl Into<String>) -> Self {
        self.receipt_email = Some(email.into()).filter(|e: &String| !e.is_empty());
        self
    }

    pub fn with_retry(mut self, max_retries: u32, base_delay: Duration) -> Self {
        self.max_retries = max_retries.max(1);
        self.retry_base_delay = base_delay;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Payment gateway client.
pub struct GatewayClient {
    config: GatewayConfig,
    http_client: reqwest::Client,
}

impl GatewayClient {
    pub fn new(config: GatewayConfig) -> Result<Self, BackendError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| BackendError::network(e.to_string()))?;
        Ok(Self {
            config,
            http_client,
        })
    }

    fn payment_body(&self, request: &InvoiceRequest) -> CreatePaymentBody {
        let amount = || Amount {
            value: request.amount.to_string(),
            currency: request.currency.clone(),
        };

        let receipt = self.config.receipt_email.as_ref().map(|email| Receipt {
            customer: ReceiptCustomer {
                email: email.clone(),
            },
            items: vec![ReceiptItem {
                description: request.description.clone(),
                amount: amount(),
                vat_code: 1,
                quantity: "1",
                payment_subject: "payment",
                payment_mode: "full_payment",
            }],
        });

        CreatePaymentBody {
            amount: amount(),
            confirmation: ConfirmationRequest {
                kind: "redirect",
                return_url: self.config.return_url.clone(),
            },
            capture: true,
            description: request.description.clone(),
            receipt,
            metadata: request.payload.to_metadata(),
        }
    }

    async fn get_payment(&self, payment_id: &str) -> Result<Payment, BackendError> {
        let url = format!("{}/payments/{}", self.config.base_url, payment_id);
        let mut delay = self.config.retry_base_delay;

        for attempt in 1..=self.config.max_retries {
            let response = self
                .http_client
                .get(&url)
                .basic_auth(&self.config.shop_id, Some(self.config.secret_key.expose_secret()))
                .send()
                .await
                .map_err(|e| BackendError::network(e.to_string()))?;

            let status = response.status();
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                if attempt < self.config.max_retries {
                    tracing::warn!(payment_id, attempt, ?delay, "Gateway throttled, backing off");
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
                continue;
            }
            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(BackendError::new(
                    BackendErrorCode::NotFound,
                    format!("payment {} not found", payment_id),
                ));
            }
            if !status.is_success() {
                let error_text = response.text().await.unwrap_or_default();
                tracing::error!(%status, error = %error_text, payment_id, "Gateway get payment failed");
                return Err(BackendError::rejected(format!("HTTP {}: {}", status, error_text)));
            }

            return response
                .json()
                .await
                .map_err(|e| BackendError::invalid_response(e.to_string()));
        }

        Err(BackendError::rate_limited(format!(
            "payment {} still throttled after {} attempts",
            payment_id, self.config.max_retries
        )))
    }
}

#[async_trait]
impl PaymentBackend for GatewayClient {
    fn kind(&self) -> BackendKind {
        BackendKind::Gateway
    }

    async fn create_invoice(&self, request: InvoiceRequest) -> Result<CreatedInvoice, BackendError> {
        let url = format!("{}/payments", self.config.base_url);
        let body = self.payment_body(&request);

        let response = self
            .http_client
            .post(&url)
            .basic_auth(&self.config.shop_id, Some(self.config.secret_key.expose_secret()))
            .header(IDEMPOTENCE_HEADER, Uuid::new_v4().to_string())
            .json(&body)
            .send()
            .await
            .map_err(|e| BackendError::network(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(BackendError::rate_limited("create payment throttled"));
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!(%status, error = %error_text, "Gateway create payment failed");
            return Err(BackendError::rejected(format!("HTTP {}: {}", status, error_text)));
        }

        let payment: Payment = response
            .json()
            .await
            .map_err(|e| BackendError::invalid_response(e.to_string()))?;

        let pay_url = payment
            .confirmation_url()
            .ok_or_else(|| BackendError::invalid_response("payment has no confirmation url"))?
            .to_string();

        tracing::info!(payment_id = %payment.id, "Gateway payment created");

        Ok(CreatedInvoice {
            correlation: InvoiceCorrelation::Gateway {
                payment_id: payment.id,
                payment_url: pay_url.clone(),
            },
            pay_url,
        })
    }
}

#[async_trait]
impl InvoiceLookup for GatewayClient {
    fn kind(&self) -> BackendKind {
        BackendKind::Gateway
    }

    fn supports_bulk(&self) -> bool {
        false
    }

    async fn fetch_invoice(&self, external_id: &str) -> Result<ExternalInvoice, BackendError> {
        let payment = self.get_payment(external_id).await?;
        Ok(ExternalInvoice {
            external_id: payment.id.to_string(),
            status: InvoiceStatus::from_gateway(&payment.status, payment.paid),
            payload: CallbackPayload::from_metadata(&payment.metadata),
        })
    }

    async fn fetch_invoices(
        &self,
        external_ids: &[String],
    ) -> Result<Vec<ExternalInvoice>, BackendError> {
        let mut invoices = Vec::with_capacity(external_ids.len());
        for id in external_ids {
            invoices.push(self.fetch_invoice(id).await?);
        }
        Ok(invoices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{CustomerId, PurchaseId};
    use crate::ports::BuyerIdentity;
    use serde_json::json;
    use wiremock::matchers::{basic_auth, body_partial_json, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PAYMENT_ID: &str = "2c5f4a7e-000f-5000-9000-1b4c0e1b4d5a";

    fn config(server: &MockServer) -> GatewayConfig {
        GatewayConfig::new("shop-1", "secret-1", "https://t.me/vpn_bot")
            .with_base_url(server.uri())
            .with_retry(3, Duration::from_millis(5))
    }

    fn request() -> InvoiceRequest {
        InvoiceRequest {
            amount: 500,
            currency: "RUB".to_string(),
            months: 3,
            title: "VPN".to_string(),
            description: "VPN for 3 months".to_string(),
            payload: CallbackPayload::new(PurchaseId::from_raw(8))
                .with_customer(CustomerId::from_raw(2))
                .with_username(Some("dave".to_string())),
            buyer: BuyerIdentity::default(),
        }
    }

    #[tokio::test]
    async fn create_invoice_posts_redirect_payment_with_metadata() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/payments"))
            .and(basic_auth("shop-1", "secret-1"))
            .and(header_exists(IDEMPOTENCE_HEADER))
            .and(body_partial_json(json!({
                "amount": { "value": "500", "currency": "RUB" },
                "confirmation": { "type": "redirect", "return_url": "https://t.me/vpn_bot" },
                "capture": true,
                "metadata": { "purchaseId": "8", "customerId": "2", "username": "dave" }
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": PAYMENT_ID,
                "status": "pending",
                "paid": false,
                "confirmation": { "type": "redirect", "confirmation_url": "https://pay.example/c/1" }
            })))
            .mount(&server)
            .await;

        let created = GatewayClient::new(config(&server))
            .unwrap()
            .create_invoice(request())
            .await
            .unwrap();

        assert_eq!(created.pay_url, "https://pay.example/c/1");
        assert_eq!(
            created.correlation,
            InvoiceCorrelation::Gateway {
                payment_id: PAYMENT_ID.parse().unwrap(),
                payment_url: "https://pay.example/c/1".to_string()
            }
        );
    }

    #[tokio::test]
    async fn receipt_is_attached_when_email_is_configured() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/payments"))
            .and(body_partial_json(json!({
                "receipt": {
                    "customer": { "email": "billing@example.com" },
                    "items": [{ "vat_code": 1, "quantity": "1", "payment_mode": "full_payment" }]
                }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": PAYMENT_ID,
                "status": "pending",
                "confirmation": { "confirmation_url": "https://pay.example/c/2" }
            })))
            .mount(&server)
            .await;

        let client =
            GatewayClient::new(config(&server).with_receipt_email("billing@example.com")).unwrap();
        assert!(client.create_invoice(request()).await.is_ok());
    }

    #[tokio::test]
    async fn rejected_payment_is_not_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/payments"))
            .respond_with(ResponseTemplate::new(400).set_body_string("invalid_request"))
            .mount(&server)
            .await;

        let err = GatewayClient::new(config(&server))
            .unwrap()
            .create_invoice(request())
            .await
            .unwrap_err();
        assert_eq!(err.code, BackendErrorCode::Rejected);
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn fetch_invoice_reads_status_and_metadata() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/payments/{}", PAYMENT_ID)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": PAYMENT_ID,
                "status": "succeeded",
                "paid": true,
                "metadata": { "purchaseId": "8", "username": "dave" }
            })))
            .mount(&server)
            .await;

        let invoice = GatewayClient::new(config(&server))
            .unwrap()
            .fetch_invoice(PAYMENT_ID)
            .await
            .unwrap();

        assert_eq!(invoice.status, InvoiceStatus::Paid);
        let payload = invoice.payload.unwrap();
        assert_eq!(payload.purchase_id, PurchaseId::from_raw(8));
        assert_eq!(payload.username.as_deref(), Some("dave"));
    }

    #[tokio::test]
    async fn fetch_invoice_retries_after_throttling() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/payments/{}", PAYMENT_ID)))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/payments/{}", PAYMENT_ID)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": PAYMENT_ID,
                "status": "canceled",
                "paid": false,
                "metadata": { "purchaseId": "8" }
            })))
            .mount(&server)
            .await;

        let invoice = GatewayClient::new(config(&server))
            .unwrap()
            .fetch_invoice(PAYMENT_ID)
            .await
            .unwrap();
        assert_eq!(invoice.status, InvoiceStatus::Cancelled);
    }

    #[tokio::test]
    async fn fetch_invoice_gives_up_after_max_retries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/payments/{}", PAYMENT_ID)))
            .respond_with(ResponseTemplate::new(429))
            .expect(3)
            .mount(&server)
            .await;

        let err = GatewayClient::new(config(&server))
            .unwrap()
            .fetch_invoice(PAYMENT_ID)
            .await
            .unwrap_err();
        assert_eq!(err.code, BackendErrorCode::RateLimitExceeded);
    }

    #[tokio::test]
    async fn missing_metadata_surfaces_as_payload_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/payments/{}", PAYMENT_ID)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": PAYMENT_ID,
                "status": "succeeded",
                "paid": true
            })))
            .mount(&server)
            .await;

        let invoice = GatewayClient::new(config(&server))
            .unwrap()
            .fetch_invoice(PAYMENT_ID)
            .await
            .unwrap();
        assert!(invoice.payload.is_err());
    }
}
