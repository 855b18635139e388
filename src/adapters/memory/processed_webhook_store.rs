//! In-memory processed-webhook store.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, Timestamp};
use crate::ports::{ProcessedWebhookStore, SaveResult};

#[derive(Default)]
pub struct InMemoryProcessedWebhookStore {
    keys: RwLock<HashMap<String, Timestamp>>,
}

impl InMemoryProcessedWebhookStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProcessedWebhookStore for InMemoryProcessedWebhookStore {
    async fn contains(&self, key: &str) -> Result<bool, DomainError> {
        Ok(self.keys.read().await.contains_key(key))
    }

    async fn record(&self, key: &str) -> Result<SaveResult, DomainError> {
        let mut keys = self.keys.write().await;
        if keys.contains_key(key) {
            return Ok(SaveResult::AlreadyExists);
        }
        keys.insert(key.to_string(), Timestamp::now());
        Ok(SaveResult::Inserted)
    }

    async fn delete_before(&self, timestamp: Timestamp) -> Result<u64, DomainError> {
        let mut keys = self.keys.write().await;
        let before = keys.len();
        keys.retain(|_, at| !at.is_before(&timestamp));
        Ok((before - keys.len()) as u64)
    }
}
