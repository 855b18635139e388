//! PostgreSQL implementation of ProcessedWebhookStore.
//!
//! The primary key on `key` makes `record` first-writer-wins under concurrency.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::foundation::{DomainError, Timestamp};
use crate::ports::{ProcessedWebhookStore, SaveResult};

pub struct PostgresProcessedWebhookStore {
    pool: PgPool,
}

impl PostgresProcessedWebhookStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProcessedWebhookStore for PostgresProcessedWebhookStore {
    async fn contains(&self, key: &str) -> Result<bool, DomainError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM processed_webhook WHERE key = $1)")
                .bind(key)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| DomainError::database("Failed to check processed webhook", e))?;

        Ok(exists)
    }

    async fn record(&self, key: &str) -> Result<SaveResult, DomainError> {
        let result = sqlx::query(
            "INSERT INTO processed_webhook (key) VALUES ($1) ON CONFLICT (key) DO NOTHING",
        )
        .bind(key)
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to record processed webhook", e))?;

        if result.rows_affected() == 1 {
            Ok(SaveResult::Inserted)
        } else {
            Ok(SaveResult::AlreadyExists)
        }
    }

    async fn delete_before(&self, timestamp: Timestamp) -> Result<u64, DomainError> {
        let result = sqlx::query("DELETE FROM processed_webhook WHERE processed_at < $1")
            .bind(timestamp.as_datetime())
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::database("Failed to prune processed webhooks", e))?;

        Ok(result.rows_affected())
    }
}
