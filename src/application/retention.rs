//! Periodic pruning of processed-webhook keys.
//!
//! The dedup table only has to outlive the provider's redelivery window, so
//! rows older than the retention period are deleted on a fixed interval.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time;

use crate::domain::foundation::{DomainError, Timestamp};
use crate::ports::ProcessedWebhookStore;

/// Deletes processed-webhook keys older than `retention_days`.
pub struct WebhookRetention {
    store: Arc<dyn ProcessedWebhookStore>,
    retention_days: i64,
    interval: Duration,
}

impl WebhookRetention {
    pub fn new(store: Arc<dyn ProcessedWebhookStore>, retention_days: i64) -> Self {
        Self {
            store,
            retention_days,
            interval: Duration::from_secs(60 * 60),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Deletes everything recorded before `now - retention_days`.
    pub async fn prune_once(&self, now: Timestamp) -> Result<u64, DomainError> {
        let cutoff = now.add_days(-self.retention_days);
        self.store.delete_before(cutoff).await
    }

    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = time::interval(self.interval);
        interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        tracing::debug!("Webhook retention stopped");
                        return;
                    }
                }

                _ = interval.tick() => {
                    match self.prune_once(Timestamp::now()).await {
                        Ok(0) => {}
                        Ok(deleted) => tracing::info!(deleted, "Pruned processed webhook keys"),
                        Err(e) => tracing::warn!(error = %e, "Webhook retention sweep failed"),
                    }
                }
            }
        }
    }
}
