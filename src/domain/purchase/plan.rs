//! Plan length arithmetic and billing-period keywords.

/// Days of access per purchased month.
pub const DAYS_PER_MONTH: i64 = 30;

/// Longest plan a single purchase may buy.
pub const MAX_MONTHS: i32 = 120;

/// Days of access granted for a plan of `months`.
pub fn access_days_for_months(months: i32) -> i64 {
    i64::from(months) * DAYS_PER_MONTH
}

/// Billing period reported by the subscription provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BillingPeriod {
    Monthly,
    Quarterly,
    HalfYearly,
    Yearly,
}

impl BillingPeriod {
    /// Parses a provider keyword. Case-insensitive; `None` when unrecognized.
    pub fn parse(keyword: &str) -> Option<Self> {
        match keyword.trim().to_lowercase().as_str() {
            "monthly" | "month" | "1-month" => Some(BillingPeriod::Monthly),
            "quarterly" | "3-month" | "3months" | "3-months" | "q" => {
                Some(BillingPeriod::Quarterly)
            }
            "half-yearly" | "halfyearly" | "half_yearly" | "semiannual" => {
                Some(BillingPeriod::HalfYearly)
            }
            "yearly" | "annual" | "annually" | "y" => Some(BillingPeriod::Yearly),
            _ => None,
        }
    }

    pub fn months(&self) -> i32 {
        match self {
            BillingPeriod::Monthly => 1,
            BillingPeriod::Quarterly => 3,
            BillingPeriod::HalfYearly => 6,
            BillingPeriod::Yearly => 12,
        }
    }

    /// Month count for a keyword, defaulting to one month.
    pub fn months_from_keyword(keyword: &str) -> i32 {
        Self::parse(keyword).map(|p| p.months()).unwrap_or(1)
    }
}
