//! Purchase aggregate and its typed insert/patch values.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::foundation::{
    CustomerId, PurchaseId, StateMachine, Timestamp, ValidationError,
};

use super::plan::{access_days_for_months, MAX_MONTHS};
use super::{BackendKind, PurchaseStatus};

/// Backend-specific handle on the external invoice behind a purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InvoiceCorrelation {
    /// No external invoice id is tracked (fresh rows, in-chat, subscription webhook).
    None,

    /// Crypto invoice.
    Crypto { invoice_id: i64, invoice_url: String },

    /// Gateway payment.
    Gateway { payment_id: Uuid, payment_url: String },
}

impl InvoiceCorrelation {
    /// Backend this correlation belongs to, if it names one.
    pub fn backend(&self) -> Option<BackendKind> {
        match self {
            InvoiceCorrelation::None => None,
            InvoiceCorrelation::Crypto { .. } => Some(BackendKind::Crypto),
            InvoiceCorrelation::Gateway { .. } => Some(BackendKind::Gateway),
        }
    }

    /// External id the backend is queried by.
    pub fn external_id(&self) -> Option<String> {
        match self {
            InvoiceCorrelation::None => None,
            InvoiceCorrelation::Crypto { invoice_id, .. } => Some(invoice_id.to_string()),
            InvoiceCorrelation::Gateway { payment_id, .. } => Some(payment_id.to_string()),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, InvoiceCorrelation::None)
    }
}

impl Default for InvoiceCorrelation {
    fn default() -> Self {
        InvoiceCorrelation::None
    }
}

/// One attempted or completed payment for a subscription duration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Purchase {
    pub id: PurchaseId,
    pub customer_id: CustomerId,
    pub backend: BackendKind,
    pub status: PurchaseStatus,
    /// Plan length in months.
    pub months: i32,
    /// Whole currency units.
    pub amount: i64,
    pub currency: String,
    pub correlation: InvoiceCorrelation,
    pub created_at: Timestamp,
    pub paid_at: Option<Timestamp>,
}

impl Purchase {
    /// Days of access this purchase grants.
    pub fn access_days(&self) -> i64 {
        access_days_for_months(self.months)
    }

    /// Checks a patch against the state machine and the correlation rules.
    ///
    /// A correlation may only be attached to the purchase's own backend and
    /// only together with (or after) the move out of `new`.
    pub fn validate_patch(&self, patch: &PurchasePatch) -> Result<(), ValidationError> {
        let next_status = match patch.status {
            Some(target) if target != self.status => self.status.transition_to(target)?,
            _ => self.status,
        };

        if let Some(correlation) = &patch.correlation {
            if let Some(kind) = correlation.backend() {
                if kind != self.backend {
                    return Err(ValidationError::invalid_format(
                        "correlation",
                        format!(
                            "{} correlation cannot be attached to a {} purchase",
                            kind, self.backend
                        ),
                    ));
                }
            }
            if !correlation.is_none() && next_status == PurchaseStatus::New {
                return Err(ValidationError::invalid_format(
                    "correlation",
                    "correlation requires the purchase to leave 'new'",
                ));
            }
        }

        Ok(())
    }

    /// Applies a validated patch in place.
    pub fn apply(&mut self, patch: &PurchasePatch) -> Result<(), ValidationError> {
        self.validate_patch(patch)?;
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(correlation) = &patch.correlation {
            self.correlation = correlation.clone();
        }
        if let Some(paid_at) = patch.paid_at {
            self.paid_at = Some(paid_at);
        }
        Ok(())
    }
}

/// Values for inserting a purchase row. Rows always start in `new`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPurchase {
    pub customer_id: CustomerId,
    pub backend: BackendKind,
    pub months: i32,
    pub amount: i64,
    pub currency: String,
}

impl NewPurchase {
    pub fn new(customer_id: CustomerId, backend: BackendKind, months: i32, amount: i64) -> Self {
        Self {
            customer_id,
            backend,
            months,
            amount,
            currency: backend.default_currency().to_string(),
        }
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    /// Rejects plan lengths outside `1..=MAX_MONTHS` and negative amounts.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(1..=MAX_MONTHS).contains(&self.months) {
            return Err(ValidationError::out_of_range(
                "months",
                1,
                i64::from(MAX_MONTHS),
                i64::from(self.months),
            ));
        }
        if self.amount < 0 {
            return Err(ValidationError::out_of_range("amount", 0, i64::MAX, self.amount));
        }
        if self.currency.trim().is_empty() {
            return Err(ValidationError::empty_field("currency"));
        }
        Ok(())
    }

    /// Materializes the row as the ledger would store it.
    pub fn into_purchase(self, id: PurchaseId, created_at: Timestamp) -> Purchase {
        Purchase {
            id,
            customer_id: self.customer_id,
            backend: self.backend,
            status: PurchaseStatus::New,
            months: self.months,
            amount: self.amount,
            currency: self.currency,
            correlation: InvoiceCorrelation::None,
            created_at,
            paid_at: None,
        }
    }
}

/// Partial update of a purchase row. Unset fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurchasePatch {
    pub status: Option<PurchaseStatus>,
    pub correlation: Option<InvoiceCorrelation>,
    pub paid_at: Option<Timestamp>,
}

impl PurchasePatch {
    /// Invoice exists at the backend: record its handle and move to `pending`.
    pub fn invoice_created(correlation: InvoiceCorrelation) -> Self {
        Self {
            status: Some(PurchaseStatus::Pending),
            correlation: Some(correlation),
            paid_at: None,
        }
    }

    pub fn status(status: PurchaseStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.correlation.is_none() && self.paid_at.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn purchase(backend: BackendKind, status: PurchaseStatus) -> Purchase {
        let mut p = NewPurchase::new(CustomerId::from_raw(1), backend, 3, 900)
            .into_purchase(PurchaseId::from_raw(10), Timestamp::now());
        p.status = status;
        p
    }

    fn crypto_correlation() -> InvoiceCorrelation {
        InvoiceCorrelation::Crypto {
            invoice_id: 555,
            invoice_url: "https://pay.example/555".to_string(),
        }
    }

    #[test]
    fn new_purchase_starts_without_correlation() {
        let p = purchase(BackendKind::Crypto, PurchaseStatus::New);
        assert_eq!(p.status, PurchaseStatus::New);
        assert!(p.correlation.is_none());
        assert_eq!(p.currency, "RUB");
        assert_eq!(p.access_days(), 90);
    }

    #[test]
    fn invoice_created_moves_to_pending_with_correlation() {
        let mut p = purchase(BackendKind::Crypto, PurchaseStatus::New);
        p.apply(&PurchasePatch::invoice_created(crypto_correlation())).unwrap();
        assert_eq!(p.status, PurchaseStatus::Pending);
        assert_eq!(p.correlation.external_id(), Some("555".to_string()));
    }

    #[test]
    fn correlation_for_other_backend_is_rejected() {
        let p = purchase(BackendKind::Gateway, PurchaseStatus::New);
        let err = p
            .validate_patch(&PurchasePatch::invoice_created(crypto_correlation()))
            .unwrap_err();
        assert!(err.to_string().contains("crypto correlation"));
    }

    #[test]
    fn correlation_without_leaving_new_is_rejected() {
        let p = purchase(BackendKind::Crypto, PurchaseStatus::New);
        let patch = PurchasePatch {
            correlation: Some(crypto_correlation()),
            ..Default::default()
        };
        assert!(p.validate_patch(&patch).is_err());
    }

    #[test]
    fn patch_cannot_skip_pending() {
        let mut p = purchase(BackendKind::Crypto, PurchaseStatus::New);
        assert!(p.apply(&PurchasePatch::status(PurchaseStatus::Paid)).is_err());
        assert_eq!(p.status, PurchaseStatus::New);
    }

    #[test]
    fn same_status_patch_is_accepted() {
        let mut p = purchase(BackendKind::Crypto, PurchaseStatus::Cancelled);
        assert!(p.apply(&PurchasePatch::status(PurchaseStatus::Cancelled)).is_ok());
    }

    #[test]
    fn empty_patch_is_detected() {
        assert!(PurchasePatch::default().is_empty());
        assert!(!PurchasePatch::status(PurchaseStatus::Paid).is_empty());
    }

    #[test]
    fn new_purchase_validation_rejects_zero_months_and_negative_amount() {
        let zero = NewPurchase::new(CustomerId::from_raw(1), BackendKind::Crypto, 0, 100);
        assert!(zero.validate().is_err());

        let negative = NewPurchase::new(CustomerId::from_raw(1), BackendKind::Crypto, 1, -1);
        assert!(negative.validate().is_err());

        let blank = NewPurchase::new(CustomerId::from_raw(1), BackendKind::Crypto, 1, 1)
            .with_currency(" ");
        assert!(blank.validate().is_err());
    }

    #[test]
    fn new_purchase_validation_caps_plan_length() {
        let longest = NewPurchase::new(CustomerId::from_raw(1), BackendKind::Crypto, MAX_MONTHS, 100);
        assert!(longest.validate().is_ok());

        let too_long =
            NewPurchase::new(CustomerId::from_raw(1), BackendKind::Crypto, MAX_MONTHS + 1, 100);
        assert!(too_long.validate().is_err());

        let absurd = NewPurchase::new(CustomerId::from_raw(1), BackendKind::Crypto, 10_000_000, 100);
        assert!(matches!(
            absurd.validate(),
            Err(ValidationError::OutOfRange { ref field, .. }) if field == "months"
        ));
    }
}
