//! ProcessedWebhookStore port - tracking successfully processed webhook bodies.
//!
//! The subscription provider redelivers a webhook whenever it does not see a
//! 2xx. A body that already produced a paid purchase must be acknowledged
//! without creating a second one.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, Timestamp};

/// Outcome of recording a processed body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveResult {
    /// First time this key was recorded.
    Inserted,
    /// Another delivery already recorded it.
    AlreadyExists,
}

/// Port for remembering processed webhook bodies, keyed by body digest.
#[async_trait]
pub trait ProcessedWebhookStore: Send + Sync {
    async fn contains(&self, key: &str) -> Result<bool, DomainError>;

    /// Record `key` as processed. Must be atomic with respect to concurrent calls.
    async fn record(&self, key: &str) -> Result<SaveResult, DomainError>;

    /// Delete entries recorded before `timestamp`; returns how many.
    async fn delete_before(&self, timestamp: Timestamp) -> Result<u64, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn processed_webhook_store_is_object_safe() {
        fn _accepts_dyn(_s: &dyn ProcessedWebhookStore) {}
    }
}
