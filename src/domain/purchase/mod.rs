//! Purchase module - the Purchase Ledger's domain model.
//!
//! A purchase is one attempted payment for a plan length on one payment
//! backend, tracked through `new → pending → {paid | cancelled}`.

mod aggregate;
mod backend;
mod correlation;
mod errors;
mod plan;
mod status;

pub use aggregate::{InvoiceCorrelation, NewPurchase, Purchase, PurchasePatch};
pub use backend::BackendKind;
pub use correlation::{CallbackPayload, CorrelationError, InvoiceStatus};
pub use errors::{CustomerLookup, PurchaseError};
pub use plan::{access_days_for_months, BillingPeriod, DAYS_PER_MONTH, MAX_MONTHS};
pub use status::PurchaseStatus;
