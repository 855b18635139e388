//! InvoicePoller - periodic reconciliation for one polled backend.
//!
//! Each tick:
//! 1. Reads this backend's `pending` purchases (none ⇒ no backend call).
//! 2. Fetches their invoices in one bulk call, or one by one with bounded
//!    concurrency when the backend has no bulk lookup.
//! 3. Cancels on `Cancelled`, finalizes on `Paid` using the purchase id
//!    decoded from the invoice payload, skips `Pending`.
//!
//! A failure on one invoice never aborts the rest of the tick.
//!
//! ## Configuration
//!
//! | Setting | Default | Description |
//! |---------|---------|-------------|
//! | `poll_interval` | 5s | Time between ticks |
//! | `tick_timeout` | 30s | Outer bound on a single tick |
//! | `max_concurrent_lookups` | 4 | Parallel single-invoice fetches |

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time;

use crate::application::payment::{
    CancelOutcome, FinalizeCommand, FinalizeOutcome, PaymentOrchestrator,
};
use crate::domain::foundation::{DomainError, PurchaseId};
use crate::domain::purchase::{BackendKind, InvoiceStatus, Purchase, PurchaseStatus};
use crate::ports::{BackendError, ExternalInvoice, InvoiceLookup, PurchaseRepository};

#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub poll_interval: Duration,
    pub tick_timeout: Duration,
    pub max_concurrent_lookups: usize,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            tick_timeout: Duration::from_secs(30),
            max_concurrent_lookups: 4,
        }
    }
}

impl PollerConfig {
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_tick_timeout(mut self, timeout: Duration) -> Self {
        self.tick_timeout = timeout;
        self
    }
}

/// Counts for one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollReport {
    pub finalized: usize,
    pub cancelled: usize,
    pub still_pending: usize,
    /// Already settled elsewhere, or belonging to another backend.
    pub skipped: usize,
    pub failed: usize,
}

impl PollReport {
    pub fn is_empty(&self) -> bool {
        *self == PollReport::default()
    }
}

/// Moves `poller` onto its own task; the task ends when `shutdown` flips to true.
pub fn spawn_poller(poller: InvoicePoller, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
    tokio::spawn(async move { poller.run(shutdown).await })
}

pub struct InvoicePoller {
    lookup: Arc<dyn InvoiceLookup>,
    purchases: Arc<dyn PurchaseRepository>,
    orchestrator: Arc<PaymentOrchestrator>,
    config: PollerConfig,
}

impl InvoicePoller {
    pub fn new(
        lookup: Arc<dyn InvoiceLookup>,
        purchases: Arc<dyn PurchaseRepository>,
        orchestrator: Arc<PaymentOrchestrator>,
    ) -> Self {
        Self {
            lookup,
            purchases,
            orchestrator,
            config: PollerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: PollerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn kind(&self) -> BackendKind {
        self.lookup.kind()
    }

    /// Runs ticks until `shutdown` flips to true.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = time::interval(self.config.poll_interval);
        interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
        let backend = self.kind();

        tracing::info!(%backend, interval = ?self.config.poll_interval, "Invoice poller started");

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        tracing::info!(%backend, "Invoice poller stopped");
                        return;
                    }
                }

                _ = interval.tick() => {
                    match time::timeout(self.config.tick_timeout, self.poll_once()).await {
                        Ok(Ok(report)) if !report.is_empty() => {
                            tracing::info!(%backend, ?report, "Reconciliation tick");
                        }
                        Ok(Ok(_)) => {}
                        Ok(Err(e)) => {
                            tracing::error!(%backend, error = %e, "Reconciliation tick failed");
                        }
                        Err(_) => {
                            tracing::warn!(%backend, "Reconciliation tick timed out");
                        }
                    }
                }
            }
        }
    }

    /// Runs a single reconciliation tick.
    pub async fn poll_once(&self) -> Result<PollReport, DomainError> {
        let backend = self.kind();
        let pending = self
            .purchases
            .find_by_backend_and_status(backend, PurchaseStatus::Pending)
            .await?;
        if pending.is_empty() {
            return Ok(PollReport::default());
        }

        let mut report = PollReport::default();
        let mut by_external_id: HashMap<String, Purchase> = HashMap::new();
        for purchase in pending {
            match purchase.correlation.external_id() {
                Some(external_id) if purchase.correlation.backend() == Some(backend) => {
                    by_external_id.insert(external_id, purchase);
                }
                _ => {
                    tracing::warn!(purchase_id = %purchase.id, "Pending purchase has no invoice id");
                    report.skipped += 1;
                }
            }
        }

        let ids: Vec<String> = by_external_id.keys().cloned().collect();
        for invoice in self.fetch(&ids, &mut report).await {
            self.reconcile(invoice, &by_external_id, &mut report).await;
        }

        Ok(report)
    }

    async fn fetch(&self, ids: &[String], report: &mut PollReport) -> Vec<ExternalInvoice> {
        if ids.is_empty() {
            return Vec::new();
        }

        if self.lookup.supports_bulk() {
            return match self.lookup.fetch_invoices(ids).await {
                Ok(invoices) => invoices,
                Err(e) => {
                    tracing::error!(backend = %self.kind(), error = %e, "Bulk invoice fetch failed");
                    report.failed += ids.len();
                    Vec::new()
                }
            };
        }

        let results: Vec<(String, Result<ExternalInvoice, BackendError>)> =
            stream::iter(ids.to_vec())
                .map(|id| {
                    let lookup = Arc::clone(&self.lookup);
                    async move {
                        let result = lookup.fetch_invoice(&id).await;
                        (id, result)
                    }
                })
                .buffer_unordered(self.config.max_concurrent_lookups.max(1))
                .collect()
                .await;

        let mut invoices = Vec::with_capacity(results.len());
        for (id, result) in results {
            match result {
                Ok(invoice) => invoices.push(invoice),
                Err(e) => {
                    tracing::error!(external_id = %id, error = %e, "Invoice fetch failed");
                    report.failed += 1;
                }
            }
        }
        invoices
    }

    async fn reconcile(
        &self,
        invoice: ExternalInvoice,
        by_external_id: &HashMap<String, Purchase>,
        report: &mut PollReport,
    ) {
        match invoice.status {
            InvoiceStatus::Pending => report.still_pending += 1,

            InvoiceStatus::Cancelled => {
                let Some(purchase) = by_external_id.get(&invoice.external_id) else {
                    tracing::warn!(external_id = %invoice.external_id, "Cancelled invoice matches no pending purchase");
                    report.skipped += 1;
                    return;
                };
                match self.orchestrator.cancel_payment(purchase.id).await {
                    Ok(CancelOutcome::Cancelled) => report.cancelled += 1,
                    Ok(_) => report.skipped += 1,
                    Err(e) => {
                        tracing::error!(purchase_id = %purchase.id, error = %e, "Cancel failed");
                        report.failed += 1;
                    }
                }
            }

            InvoiceStatus::Paid => {
                let payload = match invoice.payload {
                    Ok(payload) => payload,
                    Err(e) => {
                        tracing::error!(external_id = %invoice.external_id, error = %e, "Paid invoice payload unreadable");
                        report.failed += 1;
                        return;
                    }
                };

                if !self.belongs_to_backend(payload.purchase_id, by_external_id).await {
                    tracing::warn!(
                        purchase_id = %payload.purchase_id,
                        backend = %self.kind(),
                        "Paid invoice decodes to a purchase of another backend, skipping"
                    );
                    report.skipped += 1;
                    return;
                }

                let cmd = FinalizeCommand::new(payload.purchase_id).with_username(payload.username);
                match self.orchestrator.finalize(cmd).await {
                    Ok(FinalizeOutcome::Completed { .. }) => report.finalized += 1,
                    Ok(FinalizeOutcome::AlreadyPaid) => report.skipped += 1,
                    Err(e) => {
                        tracing::error!(purchase_id = %payload.purchase_id, error = %e, "Finalize failed");
                        report.failed += 1;
                    }
                }
            }
        }
    }

    async fn belongs_to_backend(
        &self,
        purchase_id: PurchaseId,
        by_external_id: &HashMap<String, Purchase>,
    ) -> bool {
        if by_external_id.values().any(|p| p.id == purchase_id) {
            return true;
        }
        match self.purchases.find_by_id(purchase_id).await {
            Ok(Some(purchase)) => purchase.backend == self.kind(),
            Ok(None) => true,
            Err(e) => {
                tracing::warn!(purchase_id = %purchase_id, error = %e, "Backend check failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::payment::CreatePurchaseCommand;
    use crate::application::testing::{Fixture, MockLookup};
    use crate::domain::foundation::CustomerId;
    use crate::domain::purchase::CallbackPayload;
    use crate::ports::BuyerIdentity;

    async fn pending(fx: &Fixture, customer_id: CustomerId, backend: BackendKind) -> Purchase {
        let id = fx
            .orchestrator
            .create_purchase(CreatePurchaseCommand {
                customer_id,
                amount: 900,
                months: 3,
                backend,
                buyer: BuyerIdentity::default(),
                currency: None,
            })
            .await
            .unwrap()
            .purchase_id;
        fx.purchases.find_by_id(id).await.unwrap().unwrap()
    }

    fn external_id(purchase: &Purchase) -> String {
        purchase.correlation.external_id().unwrap()
    }

    fn poller(fx: &Fixture, lookup: Arc<MockLookup>) -> InvoicePoller {
        InvoicePoller::new(lookup, fx.purchases.clone(), fx.orchestrator.clone())
    }

    #[tokio::test]
    async fn no_pending_purchases_makes_no_backend_call() {
        let fx = Fixture::new();
        let lookup = Arc::new(MockLookup::bulk(BackendKind::Crypto));

        let report = poller(&fx, lookup.clone()).poll_once().await.unwrap();

        assert!(report.is_empty());
        assert_eq!(lookup.calls(), 0);
    }

    #[tokio::test]
    async fn paid_invoice_is_finalized() {
        let fx = Fixture::new();
        let c1 = fx.customer(101).await;
        let purchase = pending(&fx, c1, BackendKind::Crypto).await;
        let lookup = Arc::new(MockLookup::bulk(BackendKind::Crypto));
        lookup.set(
            &external_id(&purchase),
            InvoiceStatus::Paid,
            Ok(CallbackPayload::new(purchase.id).with_username(Some("alice".to_string()))),
        );

        let report = poller(&fx, lookup.clone()).poll_once().await.unwrap();

        assert_eq!(report.finalized, 1);
        assert_eq!(lookup.calls(), 1);
        let stored = fx.purchases.find_by_id(purchase.id).await.unwrap().unwrap();
        assert_eq!(stored.status, PurchaseStatus::Paid);
        assert_eq!(fx.provisioner.requests()[0].username.as_deref(), Some("alice"));
        assert_eq!(fx.provisioner.requests()[0].duration_days, 90);
    }

    #[tokio::test]
    async fn cancelled_invoice_cancels_purchase() {
        let fx = Fixture::new();
        let c1 = fx.customer(101).await;
        let purchase = pending(&fx, c1, BackendKind::Gateway).await;
        let lookup = Arc::new(MockLookup::single(BackendKind::Gateway));
        lookup.set(
            &external_id(&purchase),
            InvoiceStatus::Cancelled,
            Ok(CallbackPayload::new(purchase.id)),
        );

        let report = poller(&fx, lookup).poll_once().await.unwrap();

        assert_eq!(report.cancelled, 1);
        let stored = fx.purchases.find_by_id(purchase.id).await.unwrap().unwrap();
        assert_eq!(stored.status, PurchaseStatus::Cancelled);
        assert!(fx.provisioner.requests().is_empty());
    }

    #[tokio::test]
    async fn pending_invoice_is_left_alone() {
        let fx = Fixture::new();
        let c1 = fx.customer(101).await;
        let purchase = pending(&fx, c1, BackendKind::Crypto).await;
        let lookup = Arc::new(MockLookup::bulk(BackendKind::Crypto));
        lookup.set(
            &external_id(&purchase),
            InvoiceStatus::Pending,
            Ok(CallbackPayload::new(purchase.id)),
        );

        let report = poller(&fx, lookup).poll_once().await.unwrap();

        assert_eq!(report.still_pending, 1);
        let stored = fx.purchases.find_by_id(purchase.id).await.unwrap().unwrap();
        assert_eq!(stored.status, PurchaseStatus::Pending);
    }

    #[tokio::test]
    async fn one_failure_does_not_abort_the_batch() {
        let fx = Fixture::new();
        let c1 = fx.customer(101).await;
        let c2 = fx.customer(102).await;
        let broken = pending(&fx, c1, BackendKind::Gateway).await;
        let healthy = pending(&fx, c2, BackendKind::Gateway).await;
        let lookup = Arc::new(MockLookup::single(BackendKind::Gateway));
        lookup.fail_for(&external_id(&broken));
        lookup.set(
            &external_id(&healthy),
            InvoiceStatus::Paid,
            Ok(CallbackPayload::new(healthy.id)),
        );

        let report = poller(&fx, lookup).poll_once().await.unwrap();

        assert_eq!(report.failed, 1);
        assert_eq!(report.finalized, 1);
    }

    #[tokio::test]
    async fn unreadable_payload_is_counted_as_failure() {
        let fx = Fixture::new();
        let c1 = fx.customer(101).await;
        let purchase = pending(&fx, c1, BackendKind::Crypto).await;
        let lookup = Arc::new(MockLookup::bulk(BackendKind::Crypto));
        lookup.set(
            &external_id(&purchase),
            InvoiceStatus::Paid,
            CallbackPayload::parse("customerId=1"),
        );

        let report = poller(&fx, lookup).poll_once().await.unwrap();

        assert_eq!(report.failed, 1);
        let stored = fx.purchases.find_by_id(purchase.id).await.unwrap().unwrap();
        assert_eq!(stored.status, PurchaseStatus::Pending);
    }

    #[tokio::test]
    async fn poller_never_touches_another_backends_purchase() {
        let fx = Fixture::new();
        let c1 = fx.customer(101).await;
        let crypto = pending(&fx, c1, BackendKind::Crypto).await;
        let gateway = pending(&fx, c1, BackendKind::Gateway).await;
        let lookup = Arc::new(MockLookup::bulk(BackendKind::Crypto));
        // Crypto invoice whose payload points at the gateway purchase.
        lookup.set(
            &external_id(&crypto),
            InvoiceStatus::Paid,
            Ok(CallbackPayload::new(gateway.id)),
        );

        let report = poller(&fx, lookup).poll_once().await.unwrap();

        assert_eq!(report.skipped, 1);
        assert_eq!(report.finalized, 0);
        let stored = fx.purchases.find_by_id(gateway.id).await.unwrap().unwrap();
        assert_eq!(stored.status, PurchaseStatus::Pending);
        assert!(fx.provisioner.requests().is_empty());
    }

    #[tokio::test]
    async fn paid_invoice_for_unknown_purchase_fails_without_aborting() {
        let fx = Fixture::new();
        let c1 = fx.customer(101).await;
        let purchase = pending(&fx, c1, BackendKind::Crypto).await;
        let lookup = Arc::new(MockLookup::bulk(BackendKind::Crypto));
        lookup.set(
            &external_id(&purchase),
            InvoiceStatus::Paid,
            Ok(CallbackPayload::new(PurchaseId::from_raw(9_999))),
        );

        let report = poller(&fx, lookup).poll_once().await.unwrap();

        assert_eq!(report.failed, 1);
    }

    #[tokio::test]
    async fn bulk_fetch_failure_fails_every_item() {
        let fx = Fixture::new();
        let c1 = fx.customer(101).await;
        let c2 = fx.customer(102).await;
        pending(&fx, c1, BackendKind::Crypto).await;
        pending(&fx, c2, BackendKind::Crypto).await;
        let lookup = Arc::new(MockLookup::bulk(BackendKind::Crypto));
        lookup.fail_all();

        let report = poller(&fx, lookup).poll_once().await.unwrap();

        assert_eq!(report.failed, 2);
    }

    #[tokio::test]
    async fn run_stops_on_shutdown_signal() {
        let fx = Fixture::new();
        let lookup = Arc::new(MockLookup::bulk(BackendKind::Crypto));
        let poller = poller(&fx, lookup)
            .with_config(PollerConfig::default().with_poll_interval(Duration::from_millis(10)));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = spawn_poller(poller, shutdown_rx);

        tokio::time::sleep(Duration::from_millis(30)).await;
        shutdown_tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("poller did not stop")
            .unwrap();
    }

    #[tokio::test]
    async fn spawned_single_lookup_poller_settles_in_background() {
        let fx = Fixture::new();
        let c1 = fx.customer(101).await;
        let purchase = pending(&fx, c1, BackendKind::Gateway).await;
        let lookup = Arc::new(MockLookup::single(BackendKind::Gateway));
        lookup.set(
            &external_id(&purchase),
            InvoiceStatus::Paid,
            Ok(CallbackPayload::new(purchase.id)),
        );
        let poller = poller(&fx, lookup)
            .with_config(PollerConfig::default().with_poll_interval(Duration::from_millis(10)));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = spawn_poller(poller, shutdown_rx);

        let mut status = PurchaseStatus::Pending;
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            status = fx.purchases.find_by_id(purchase.id).await.unwrap().unwrap().status;
            if status == PurchaseStatus::Paid {
                break;
            }
        }
        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();

        assert_eq!(status, PurchaseStatus::Paid);
    }

    #[test]
    fn config_defaults_match_observed_schedule() {
        let config = PollerConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.tick_timeout, Duration::from_secs(30));
    }
}
