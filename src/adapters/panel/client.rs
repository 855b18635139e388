//! Panel API client.
//!
//! Implements `SubscriptionProvisioner`: look the buyer up by chat id, then
//! create the account or extend it from whichever is later of its current
//! expiry and now.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::domain::foundation::{TelegramId, Timestamp};
use crate::ports::{ProvisionError, ProvisionRequest, ProvisionedAccount, SubscriptionProvisioner};

use super::types::{CreateUserBody, Envelope, Inbound, PanelUser, UpdateUserBody};

const ACTIVE: &str = "ACTIVE";
const MONTHLY_TRAFFIC_RESET: &str = "MONTH";

/// Panel API configuration.
#[derive(Clone)]
pub struct PanelConfig {
    base_url: String,
    token: SecretString,
    /// Panel reached over loopback; it expects proxy headers it would
    /// otherwise get from its reverse proxy.
    local_mode: bool,
    /// Inbounds new accounts are attached to. Empty means all of them.
    inbound_uuids: Vec<Uuid>,
    timeout: Duration,
}

impl PanelConfig {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: SecretString::new(token.into()),
            local_mode: false,
            inbound_uuids: Vec::new(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_local_mode(mut self, local: bool) -> Self {
        self.local_mode = local;
        self
    }

    pub fn with_inbounds(mut self, inbound_uuids: Vec<Uuid>) -> Self {
        self.inbound_uuids = inbound_uuids;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Panel API client.
pub struct PanelClient {
    config: PanelConfig,
    http_client: reqwest::Client,
}

impl PanelClient {
    pub fn new(config: PanelConfig) -> Result<Self, ProvisionError> {
        let mut headers = HeaderMap::new();
        if config.local_mode {
            headers.insert("x-forwarded-for", HeaderValue::from_static("127.0.0.1"));
            headers.insert("x-forwarded-proto", HeaderValue::from_static("https"));
        }

        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| ProvisionError::Network(e.to_string()))?;

        Ok(Self {
            config,
            http_client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    async fn decode<T: DeserializeOwned>(
        response: reqwest::Response,
        operation: &str,
    ) -> Result<T, ProvisionError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = status.as_u16(), error = %body, operation, "Panel request failed");
            return Err(ProvisionError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }

        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| ProvisionError::InvalidResponse(e.to_string()))?;
        Ok(envelope.response)
    }

    async fn find_user(&self, telegram_id: TelegramId) -> Result<Option<PanelUser>, ProvisionError> {
        let response = self
            .http_client
            .get(self.url(&format!("/api/users/tg/{}", telegram_id)))
            .bearer_auth(self.config.token.expose_secret())
            .send()
            .await
            .map_err(|e| ProvisionError::Network(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let users: Vec<PanelUser> = Self::decode(response, "find_user").await?;
        Ok(users.into_iter().next())
    }

    async fn inbounds(&self) -> Result<Vec<Uuid>, ProvisionError> {
        let response = self
            .http_client
            .get(self.url("/api/inbounds"))
            .bearer_auth(self.config.token.expose_secret())
            .send()
            .await
            .map_err(|e| ProvisionError::Network(e.to_string()))?;

        let inbounds: Vec<Inbound> = Self::decode(response, "list_inbounds").await?;
        if self.config.inbound_uuids.is_empty() {
            return Ok(inbounds.into_iter().map(|i| i.uuid).collect());
        }

        let selected: Vec<Uuid> = inbounds
            .into_iter()
            .filter(|i| self.config.inbound_uuids.contains(&i.uuid))
            .inspect(|i| tracing::debug!(uuid = %i.uuid, tag = ?i.tag, "Using inbound"))
            .map(|i| i.uuid)
            .collect();
        if selected.is_empty() {
            tracing::warn!("None of the configured inbounds exist on the panel");
        }
        Ok(selected)
    }

    async fn create_user(&self, request: &ProvisionRequest) -> Result<PanelUser, ProvisionError> {
        let expire_at = extended_expiry(None, Timestamp::now(), request.duration_days)?;
        let body = CreateUserBody {
            username: format!("{}_{}", request.customer_id, request.telegram_id),
            status: ACTIVE,
            traffic_limit_strategy: MONTHLY_TRAFFIC_RESET,
            active_user_inbounds: self.inbounds().await?,
            telegram_id: request.telegram_id.as_i64(),
            expire_at,
            traffic_limit_bytes: request.traffic_limit_bytes,
            description: request.username.clone(),
        };

        let response = self
            .http_client
            .post(self.url("/api/users"))
            .bearer_auth(self.config.token.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| ProvisionError::Network(e.to_string()))?;

        Self::decode(response, "create_user").await
    }

    async fn extend_user(
        &self,
        existing: &PanelUser,
        request: &ProvisionRequest,
    ) -> Result<PanelUser, ProvisionError> {
        let expire_at =
            extended_expiry(existing.expire_at, Timestamp::now(), request.duration_days)?;
        let body = UpdateUserBody {
            uuid: existing.uuid,
            status: ACTIVE,
            expire_at,
            telegram_id: existing.telegram_id.unwrap_or(request.telegram_id.as_i64()),
            traffic_limit_bytes: request.traffic_limit_bytes,
            description: request.username.clone(),
        };

        let response = self
            .http_client
            .post(self.url("/api/users/update"))
            .bearer_auth(self.config.token.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| ProvisionError::Network(e.to_string()))?;

        Self::decode(response, "update_user").await
    }
}

/// New expiry after adding `days`. A lapsed account restarts from `now`
/// so the buyer never pays for time already gone.
fn extended_expiry(
    current: Option<Timestamp>,
    now: Timestamp,
    days: i64,
) -> Result<Timestamp, ProvisionError> {
    let base = match current {
        Some(expiry) if expiry.is_after(&now) => expiry,
        _ => now,
    };
    base.checked_add_days(days)
        .ok_or(ProvisionError::InvalidDuration(days))
}

#[async_trait]
impl SubscriptionProvisioner for PanelClient {
    #[tracing::instrument(skip(self, request), fields(telegram_id = %request.telegram_id, days = request.duration_days))]
    async fn create_or_update_account(
        &self,
        request: ProvisionRequest,
    ) -> Result<ProvisionedAccount, ProvisionError> {
        let user = match self.find_user(request.telegram_id).await? {
            Some(existing) => self.extend_user(&existing, &request).await?,
            None => {
                tracing::info!("No panel account yet, creating one");
                self.create_user(&request).await?
            }
        };

        let expire_at = user
            .expire_at
            .ok_or_else(|| ProvisionError::InvalidResponse("account has no expiry".to_string()))?;

        Ok(ProvisionedAccount {
            subscription_link: user.subscription_url,
            expire_at,
        })
    }
}
