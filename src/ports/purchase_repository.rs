//! Purchase repository port - the Purchase Ledger.
//!
//! The ledger is the source of truth for whether a purchase has already been
//! fulfilled. Besides plain reads and patches it offers two conditional
//! writes that concurrent finalize/cancel callers rely on.

use async_trait::async_trait;

use crate::domain::foundation::{CustomerId, DomainError, PurchaseId, Timestamp};
use crate::domain::purchase::{BackendKind, NewPurchase, Purchase, PurchasePatch, PurchaseStatus};

/// Repository port for purchase persistence.
#[async_trait]
pub trait PurchaseRepository: Send + Sync {
    /// Insert a new purchase in status `new` and return its ledger id.
    async fn create(&self, purchase: NewPurchase) -> Result<PurchaseId, DomainError>;

    /// Find a purchase by id. Returns `None` if absent.
    async fn find_by_id(&self, id: PurchaseId) -> Result<Option<Purchase>, DomainError>;

    /// All purchases of one backend in one status.
    ///
    /// Pollers call this with `Pending` for their own backend only.
    async fn find_by_backend_and_status(
        &self,
        backend: BackendKind,
        status: PurchaseStatus,
    ) -> Result<Vec<Purchase>, DomainError>;

    /// Latest non-cancelled purchase of `backend` for each of `customers`.
    async fn find_latest_open_by_customers(
        &self,
        backend: BackendKind,
        customers: &[CustomerId],
    ) -> Result<Vec<Purchase>, DomainError>;

    /// Apply a typed partial update.
    ///
    /// # Errors
    ///
    /// - `PurchaseNotFound` if no row was affected
    /// - `DatabaseError` on persistence failure
    async fn update(&self, id: PurchaseId, patch: PurchasePatch) -> Result<(), DomainError>;

    /// Set status `paid` and `paid_at` only if the row is still `pending`.
    ///
    /// Returns `false` when another caller got there first (or the row is
    /// not pending); the caller must then skip its remaining side effects.
    async fn mark_paid_if_pending(
        &self,
        id: PurchaseId,
        paid_at: Timestamp,
    ) -> Result<bool, DomainError>;

    /// Set status `cancelled` only if the row is `new` or `pending`.
    ///
    /// Returns `false` when the row was already terminal.
    async fn cancel_if_open(&self, id: PurchaseId) -> Result<bool, DomainError>;
}
