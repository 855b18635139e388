//! Hand-written doubles for the external-service ports.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::adapters::memory::{
    InMemoryCustomerRepository, InMemoryPurchaseRepository, InMemoryReferralRepository,
};
use crate::application::payment::{OrchestratorSettings, PaymentOrchestrator};
use crate::domain::customer::{CustomerPatch, NewCustomer};
use crate::domain::foundation::{CustomerId, TelegramId, Timestamp};
use crate::domain::purchase::{
    BackendKind, CallbackPayload, CorrelationError, InvoiceCorrelation, InvoiceStatus,
};
use crate::ports::{
    BackendError, BackendErrorCode, CreatedInvoice, CustomerRepository, ExternalInvoice,
    InvoiceLookup, InvoiceRequest, MessageCatalog, Notification, Notifier, NotifierError,
    PaymentBackend, ProvisionError, ProvisionRequest, ProvisionedAccount, SubscriptionProvisioner,
};

// ════════════════════════════════════════════════════════════════════════════
// Provisioner
// ════════════════════════════════════════════════════════════════════════════

pub struct MockProvisioner {
    pub requests: Mutex<Vec<ProvisionRequest>>,
    pub fail: bool,
    /// Fails only requests for this customer while set.
    pub fail_for: Mutex<Option<CustomerId>>,
}

impl MockProvisioner {
    pub fn new() -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            fail: false,
            fail_for: Mutex::new(None),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn fail_only_for(&self, customer_id: CustomerId) {
        *self.fail_for.lock().unwrap() = Some(customer_id);
    }

    pub fn recover(&self) {
        *self.fail_for.lock().unwrap() = None;
    }

    pub fn requests(&self) -> Vec<ProvisionRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn days_for(&self, customer_id: CustomerId) -> Vec<i64> {
        self.requests()
            .into_iter()
            .filter(|r| r.customer_id == customer_id)
            .map(|r| r.duration_days)
            .collect()
    }
}

#[async_trait]
impl SubscriptionProvisioner for MockProvisioner {
    async fn create_or_update_account(
        &self,
        request: ProvisionRequest,
    ) -> Result<ProvisionedAccount, ProvisionError> {
        self.requests.lock().unwrap().push(request.clone());
        let blocked = *self.fail_for.lock().unwrap() == Some(request.customer_id);
        if self.fail || blocked {
            return Err(ProvisionError::Network("panel unreachable".to_string()));
        }
        Ok(ProvisionedAccount {
            subscription_link: format!("https://sub.example/{}", request.customer_id),
            expire_at: Timestamp::now().add_days(request.duration_days),
        })
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Notifier
// ════════════════════════════════════════════════════════════════════════════

pub struct MockNotifier {
    pub sent: Mutex<Vec<Notification>>,
    pub fail: bool,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, chat_id: TelegramId) -> Vec<Notification> {
        self.sent().into_iter().filter(|n| n.chat_id == chat_id).collect()
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn send(&self, notification: Notification) -> Result<(), NotifierError> {
        if self.fail {
            return Err(NotifierError::Delivery("chat unreachable".to_string()));
        }
        self.sent.lock().unwrap().push(notification);
        Ok(())
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Catalog
// ════════════════════════════════════════════════════════════════════════════

/// Returns `<key>` for every lookup, except the templated keys.
pub struct KeyCatalog;

impl MessageCatalog for KeyCatalog {
    fn text(&self, _language: &str, key: &str) -> String {
        match key {
            "subscription_expiring" => "expires {date}".to_string(),
            "referral_bonus_granted" => "bonus {days}".to_string(),
            other => other.to_string(),
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Payment backend
// ════════════════════════════════════════════════════════════════════════════

pub struct MockBackend {
    kind: BackendKind,
    pub requests: Mutex<Vec<InvoiceRequest>>,
    next_invoice: AtomicI64,
    pub fail: bool,
}

impl MockBackend {
    pub fn new(kind: BackendKind) -> Self {
        Self {
            kind,
            requests: Mutex::new(Vec::new()),
            next_invoice: AtomicI64::new(1000),
            fail: false,
        }
    }

    pub fn failing(kind: BackendKind) -> Self {
        Self {
            fail: true,
            ..Self::new(kind)
        }
    }

    pub fn requests(&self) -> Vec<InvoiceRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentBackend for MockBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    async fn create_invoice(&self, request: InvoiceRequest) -> Result<CreatedInvoice, BackendError> {
        self.requests.lock().unwrap().push(request);
        if self.fail {
            return Err(BackendError::network("timeout"));
        }
        let n = self.next_invoice.fetch_add(1, Ordering::SeqCst);
        let correlation = match self.kind {
            BackendKind::Crypto => InvoiceCorrelation::Crypto {
                invoice_id: n,
                invoice_url: format!("https://t.me/CryptoBot?start=IV{}", n),
            },
            BackendKind::Gateway => InvoiceCorrelation::Gateway {
                payment_id: uuid::Uuid::new_v4(),
                payment_url: format!("https://gateway.example/pay/{}", n),
            },
            _ => InvoiceCorrelation::None,
        };
        let pay_url = match &correlation {
            InvoiceCorrelation::Crypto { invoice_url, .. } => invoice_url.clone(),
            InvoiceCorrelation::Gateway { payment_url, .. } => payment_url.clone(),
            InvoiceCorrelation::None => format!("https://pay.example/{}", n),
        };
        Ok(CreatedInvoice {
            correlation,
            pay_url,
        })
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Fixture
// ════════════════════════════════════════════════════════════════════════════

pub const TRAFFIC_LIMIT: i64 = 100 * 1_073_741_824;
pub const REFERRAL_DAYS: i64 = 15;
pub const TRIAL_DAYS: i64 = 3;

pub fn settings() -> OrchestratorSettings {
    OrchestratorSettings {
        traffic_limit_bytes: TRAFFIC_LIMIT,
        trial_days: TRIAL_DAYS,
        trial_traffic_limit_bytes: 10 * 1_073_741_824,
        referral_bonus_days: REFERRAL_DAYS,
    }
}

/// Memory ledgers plus mocks, wired into an orchestrator.
pub struct Fixture {
    pub purchases: Arc<InMemoryPurchaseRepository>,
    pub customers: Arc<InMemoryCustomerRepository>,
    pub referrals: Arc<InMemoryReferralRepository>,
    pub provisioner: Arc<MockProvisioner>,
    pub notifier: Arc<MockNotifier>,
    pub orchestrator: Arc<PaymentOrchestrator>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::build(MockProvisioner::new(), MockNotifier::new(), settings(), |o| o)
    }

    pub fn build(
        provisioner: MockProvisioner,
        notifier: MockNotifier,
        settings: OrchestratorSettings,
        configure: impl FnOnce(PaymentOrchestrator) -> PaymentOrchestrator,
    ) -> Self {
        let purchases = Arc::new(InMemoryPurchaseRepository::new());
        let customers = Arc::new(InMemoryCustomerRepository::new());
        let referrals = Arc::new(InMemoryReferralRepository::new());
        let provisioner = Arc::new(provisioner);
        let notifier = Arc::new(notifier);
        let orchestrator = PaymentOrchestrator::new(
            purchases.clone(),
            customers.clone(),
            referrals.clone(),
            provisioner.clone(),
            notifier.clone(),
            Arc::new(KeyCatalog),
            settings,
        )
        .with_backend(Arc::new(MockBackend::new(BackendKind::Crypto)))
        .with_backend(Arc::new(MockBackend::new(BackendKind::Gateway)))
        .with_backend(Arc::new(MockBackend::new(BackendKind::InChat)))
        .with_backend(Arc::new(MockBackend::new(BackendKind::SubscriptionWebhook)));
        let orchestrator = Arc::new(configure(orchestrator));

        Self {
            purchases,
            customers,
            referrals,
            provisioner,
            notifier,
            orchestrator,
        }
    }

    pub async fn customer(&self, telegram_id: i64) -> CustomerId {
        self.customers
            .create(NewCustomer::new(TelegramId::from_raw(telegram_id), "en"))
            .await
            .unwrap()
            .id
    }

    pub async fn customer_expiring_in(&self, telegram_id: i64, expire_at: Timestamp) -> CustomerId {
        let id = self.customer(telegram_id).await;
        self.customers
            .update(id, CustomerPatch::access(expire_at, "https://sub.example/old"))
            .await
            .unwrap();
        id
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Invoice lookup
// ════════════════════════════════════════════════════════════════════════════

pub struct MockLookup {
    kind: BackendKind,
    bulk: bool,
    invoices: Mutex<HashMap<String, ExternalInvoice>>,
    failing: Mutex<HashSet<String>>,
    fail_all: AtomicBool,
    calls: AtomicUsize,
}

impl MockLookup {
    pub fn bulk(kind: BackendKind) -> Self {
        Self::build(kind, true)
    }

    pub fn single(kind: BackendKind) -> Self {
        Self::build(kind, false)
    }

    fn build(kind: BackendKind, bulk: bool) -> Self {
        Self {
            kind,
            bulk,
            invoices: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
            fail_all: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set(
        &self,
        external_id: &str,
        status: InvoiceStatus,
        payload: Result<CallbackPayload, CorrelationError>,
    ) {
        self.invoices.lock().unwrap().insert(
            external_id.to_string(),
            ExternalInvoice {
                external_id: external_id.to_string(),
                status,
                payload,
            },
        );
    }

    pub fn fail_for(&self, external_id: &str) {
        self.failing.lock().unwrap().insert(external_id.to_string());
    }

    pub fn fail_all(&self) {
        self.fail_all.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InvoiceLookup for MockLookup {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn supports_bulk(&self) -> bool {
        self.bulk
    }

    async fn fetch_invoice(&self, external_id: &str) -> Result<ExternalInvoice, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_all.load(Ordering::SeqCst) || self.failing.lock().unwrap().contains(external_id) {
            return Err(BackendError::network("connection reset"));
        }
        self.invoices
            .lock()
            .unwrap()
            .get(external_id)
            .cloned()
            .ok_or_else(|| BackendError::new(BackendErrorCode::NotFound, external_id))
    }

    async fn fetch_invoices(
        &self,
        external_ids: &[String],
    ) -> Result<Vec<ExternalInvoice>, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(BackendError::network("connection reset"));
        }
        let invoices = self.invoices.lock().unwrap();
        Ok(external_ids
            .iter()
            .filter_map(|id| invoices.get(id).cloned())
            .collect())
    }
}
