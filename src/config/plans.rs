//! Plan and bonus settings

use serde::Deserialize;

use super::error::ValidationError;

const BYTES_PER_GB: i64 = 1024 * 1024 * 1024;

#[derive(Debug, Clone, Deserialize)]
pub struct PlansConfig {
    /// Monthly traffic quota for paid accounts; 0 means unlimited
    #[serde(default = "default_traffic_limit_gb")]
    pub traffic_limit_gb: i64,

    /// 0 disables trials
    #[serde(default)]
    pub trial_days: i64,

    #[serde(default = "default_trial_traffic_limit_gb")]
    pub trial_traffic_limit_gb: i64,

    /// Days credited to a referrer on the referee's first payment
    #[serde(default = "default_referral_days")]
    pub referral_days: i64,
}

impl PlansConfig {
    pub fn traffic_limit_bytes(&self) -> i64 {
        self.traffic_limit_gb * BYTES_PER_GB
    }

    pub fn trial_traffic_limit_bytes(&self) -> i64 {
        self.trial_traffic_limit_gb * BYTES_PER_GB
    }

    /// Validate plan settings
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.traffic_limit_gb < 0 || self.trial_traffic_limit_gb < 0 {
            return Err(ValidationError::InvalidPlan("traffic limits cannot be negative"));
        }
        if self.trial_days < 0 {
            return Err(ValidationError::InvalidPlan("trial_days cannot be negative"));
        }
        if self.referral_days < 0 {
            return Err(ValidationError::InvalidPlan("referral_days cannot be negative"));
        }
        Ok(())
    }
}

impl Default for PlansConfig {
    fn default() -> Self {
        Self {
            traffic_limit_gb: default_traffic_limit_gb(),
            trial_days: 0,
            trial_traffic_limit_gb: default_trial_traffic_limit_gb(),
            referral_days: default_referral_days(),
        }
    }
}

fn default_traffic_limit_gb() -> i64 {
    100
}

fn default_trial_traffic_limit_gb() -> i64 {
    10
}

fn default_referral_days() -> i64 {
    15
}
