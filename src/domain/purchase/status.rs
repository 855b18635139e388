//! Purchase status state machine.
//!
//! ```text
//! new ──▶ pending ──▶ paid       (terminal)
//!                └──▶ cancelled  (terminal)
//! ```

use crate::domain::foundation::StateMachine;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::ValidationError;

/// Lifecycle status of a purchase in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseStatus {
    /// Row written, no invoice exists at the backend yet.
    New,

    /// Invoice created at the backend, waiting for the buyer to pay.
    Pending,

    /// Backend confirmed payment and the purchase was finalized.
    Paid,

    /// Backend reported the invoice as cancelled or expired.
    Cancelled,
}

impl PurchaseStatus {
    /// Storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseStatus::New => "new",
            PurchaseStatus::Pending => "pending",
            PurchaseStatus::Paid => "paid",
            PurchaseStatus::Cancelled => "cancelled",
        }
    }

    /// True while the purchase can still be paid or cancelled.
    pub fn is_open(&self) -> bool {
        matches!(self, PurchaseStatus::New | PurchaseStatus::Pending)
    }
}

impl StateMachine for PurchaseStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use PurchaseStatus::*;
        matches!(
            (self, target),
            (New, Pending) | (Pending, Paid) | (Pending, Cancelled)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use PurchaseStatus::*;
        match self {
            New => vec![Pending],
            Pending => vec![Paid, Cancelled],
            Paid | Cancelled => vec![],
        }
    }
}

impl fmt::Display for PurchaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PurchaseStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "new" => Ok(PurchaseStatus::New),
            "pending" => Ok(PurchaseStatus::Pending),
            "paid" => Ok(PurchaseStatus::Paid),
            // "cancel" is the spelling older rows were written with
            "cancelled" | "cancel" => Ok(PurchaseStatus::Cancelled),
            other => Err(ValidationError::invalid_format(
                "purchase_status",
                format!("unknown status '{}'", other),
            )),
        }
    }
}
