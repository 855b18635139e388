//! In-memory Purchase Ledger.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::RwLock;

use crate::domain::foundation::{CustomerId, DomainError, ErrorCode, PurchaseId, Timestamp};
use crate::domain::purchase::{BackendKind, NewPurchase, Purchase, PurchasePatch, PurchaseStatus};
use crate::ports::PurchaseRepository;

#[derive(Default)]
pub struct InMemoryPurchaseRepository {
    purchases: RwLock<BTreeMap<PurchaseId, Purchase>>,
    next_id: AtomicI64,
}

impl InMemoryPurchaseRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored purchase, ordered by id.
    pub async fn all(&self) -> Vec<Purchase> {
        self.purchases.read().await.values().cloned().collect()
    }

    fn not_found(id: PurchaseId) -> DomainError {
        DomainError::new(ErrorCode::PurchaseNotFound, format!("Purchase {} not found", id))
            .with_detail("purchase_id", id.to_string())
    }
}

#[async_trait]
impl PurchaseRepository for InMemoryPurchaseRepository {
    async fn create(&self, purchase: NewPurchase) -> Result<PurchaseId, DomainError> {
        purchase.validate()?;
        let id = PurchaseId::from_raw(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let record = purchase.into_purchase(id, Timestamp::now());
        self.purchases.write().await.insert(id, record);
        Ok(id)
    }

    async fn find_by_id(&self, id: PurchaseId) -> Result<Option<Purchase>, DomainError> {
        Ok(self.purchases.read().await.get(&id).cloned())
    }

    async fn find_by_backend_and_status(
        &self,
        backend: BackendKind,
        status: PurchaseStatus,
    ) -> Result<Vec<Purchase>, DomainError> {
        Ok(self
            .purchases
            .read()
            .await
            .values()
            .filter(|p| p.backend == backend && p.status == status)
            .cloned()
            .collect())
    }

    async fn find_latest_open_by_customers(
        &self,
        backend: BackendKind,
        customers: &[CustomerId],
    ) -> Result<Vec<Purchase>, DomainError> {
        let purchases = self.purchases.read().await;
        let mut latest: HashMap<CustomerId, &Purchase> = HashMap::new();
        for purchase in purchases.values().filter(|p| {
            p.backend == backend
                && p.status != PurchaseStatus::Cancelled
                && customers.contains(&p.customer_id)
        }) {
            let newer = latest
                .get(&purchase.customer_id)
                .map(|current| (purchase.created_at, purchase.id) > (current.created_at, current.id))
                .unwrap_or(true);
            if newer {
                latest.insert(purchase.customer_id, purchase);
            }
        }
        let mut result: Vec<Purchase> = latest.into_values().cloned().collect();
        result.sort_by_key(|p| p.id);
        Ok(result)
    }

    async fn update(&self, id: PurchaseId, patch: PurchasePatch) -> Result<(), DomainError> {
        let mut purchases = self.purchases.write().await;
        let purchase = purchases.get_mut(&id).ok_or_else(|| Self::not_found(id))?;
        if patch.is_empty() {
            return Ok(());
        }
        purchase.apply(&patch)?;
        Ok(())
    }

    async fn mark_paid_if_pending(
        &self,
        id: PurchaseId,
        paid_at: Timestamp,
    ) -> Result<bool, DomainError> {
        let mut purchases = self.purchases.write().await;
        match purchases.get_mut(&id) {
            Some(purchase) if purchase.status == PurchaseStatus::Pending => {
                purchase.status = PurchaseStatus::Paid;
                purchase.paid_at = Some(paid_at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn cancel_if_open(&self, id: PurchaseId) -> Result<bool, DomainError> {
        let mut purchases = self.purchases.write().await;
        match purchases.get_mut(&id) {
            Some(purchase) if purchase.status.is_open() => {
                purchase.status = PurchaseStatus::Cancelled;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
