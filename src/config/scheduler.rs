//! Background job schedules

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Outer deadline for one poller tick
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,

    /// Concurrent lookups for backends without bulk reads
    #[serde(default = "default_poll_concurrency")]
    pub poll_concurrency: usize,

    #[serde(default = "default_expiration_hour")]
    pub expiration_hour_utc: u32,

    #[serde(default = "default_lookahead_days")]
    pub lookahead_days: i64,

    #[serde(default = "default_cache_ttl")]
    pub customer_cache_ttl_secs: u64,

    /// How long processed webhook bodies are remembered
    #[serde(default = "default_webhook_retention")]
    pub webhook_retention_days: i64,
}

impl SchedulerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs)
    }

    pub fn customer_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.customer_cache_ttl_secs)
    }

    /// Validate schedules
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.poll_interval_secs == 0 {
            return Err(ValidationError::InvalidSchedule("poll_interval_secs must be positive"));
        }
        if self.poll_timeout_secs == 0 {
            return Err(ValidationError::InvalidSchedule("poll_timeout_secs must be positive"));
        }
        if self.poll_concurrency == 0 {
            return Err(ValidationError::InvalidSchedule("poll_concurrency must be positive"));
        }
        if self.expiration_hour_utc > 23 {
            return Err(ValidationError::InvalidSchedule("expiration_hour_utc must be 0-23"));
        }
        if self.lookahead_days < 1 {
            return Err(ValidationError::InvalidSchedule("lookahead_days must be at least 1"));
        }
        if self.webhook_retention_days < 1 {
            return Err(ValidationError::InvalidSchedule(
                "webhook_retention_days must be at least 1",
            ));
        }
        Ok(())
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            poll_timeout_secs: default_poll_timeout(),
            poll_concurrency: default_poll_concurrency(),
            expiration_hour_utc: default_expiration_hour(),
            lookahead_days: default_lookahead_days(),
            customer_cache_ttl_secs: default_cache_ttl(),
            webhook_retention_days: default_webhook_retention(),
        }
    }
}

fn default_poll_interval() -> u64 {
    5
}

fn default_poll_timeout() -> u64 {
    30
}

fn default_poll_concurrency() -> usize {
    4
}

fn default_expiration_hour() -> u32 {
    16
}

fn default_lookahead_days() -> i64 {
    3
}

fn default_cache_ttl() -> u64 {
    30 * 60
}

fn default_webhook_retention() -> i64 {
    30
}
