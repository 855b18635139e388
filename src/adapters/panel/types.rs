//! Wire types for the panel API.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::foundation::Timestamp;

/// Every response is wrapped as `{ "response": T }`.
#[derive(Debug, Deserialize)]
pub(super) struct Envelope<T> {
    pub response: T,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct PanelUser {
    pub uuid: Uuid,
    pub subscription_url: String,
    #[serde(default)]
    pub expire_at: Option<Timestamp>,
    #[serde(default)]
    pub telegram_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(super) struct Inbound {
    pub uuid: Uuid,
    #[serde(default)]
    pub tag: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct CreateUserBody {
    pub username: String,
    pub status: &'static str,
    pub traffic_limit_strategy: &'static str,
    pub active_user_inbounds: Vec<Uuid>,
    pub telegram_id: i64,
    pub expire_at: Timestamp,
    pub traffic_limit_bytes: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct UpdateUserBody {
    pub uuid: Uuid,
    pub status: &'static str,
    pub expire_at: Timestamp,
    pub telegram_id: i64,
    pub traffic_limit_bytes: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}
