//! PaymentOrchestrator - creates, finalizes and cancels purchases.
//!
//! Every decision reads through the repositories; nothing about a purchase
//! is cached here. `finalize` is called by both pollers, the webhook
//! handler and the buyer's own success callback, so the ledger's
//! `mark_paid_if_pending` is the single point that decides who performs
//! the post-payment side effects.

use std::collections::HashMap;
use std::sync::Arc;

use crate::application::messages;
use crate::domain::customer::{Customer, CustomerPatch};
use crate::domain::foundation::{CustomerId, PurchaseId, TelegramId, Timestamp};
use crate::domain::purchase::{
    BackendKind, CallbackPayload, NewPurchase, PurchaseError, PurchasePatch, PurchaseStatus,
};
use crate::ports::{
    BuyerIdentity, CustomerRepository, InvoiceRequest, MessageCatalog, Notification,
    NotificationAction, Notifier, PaymentBackend, ProvisionRequest, ProvisionedAccount,
    PurchaseRepository, ReferralRepository, SubscriptionProvisioner,
};

/// Plan-independent knobs for provisioning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorSettings {
    pub traffic_limit_bytes: i64,
    /// Zero disables trials.
    pub trial_days: i64,
    pub trial_traffic_limit_bytes: i64,
    pub referral_bonus_days: i64,
}

/// Command to start a purchase on one backend.
#[derive(Debug, Clone)]
pub struct CreatePurchaseCommand {
    pub customer_id: CustomerId,
    pub amount: i64,
    pub months: i32,
    pub backend: BackendKind,
    pub buyer: BuyerIdentity,
    /// Overrides the backend's default currency.
    pub currency: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatePurchaseResult {
    pub purchase_id: PurchaseId,
    pub payment_url: String,
}

/// Command to settle a purchase the backend reported as paid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizeCommand {
    pub purchase_id: PurchaseId,
    /// Chat handle recovered from the invoice payload, if any.
    pub username: Option<String>,
}

impl FinalizeCommand {
    pub fn new(purchase_id: PurchaseId) -> Self {
        Self {
            purchase_id,
            username: None,
        }
    }

    pub fn with_username(mut self, username: Option<String>) -> Self {
        self.username = username;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalizeOutcome {
    /// This call marked the purchase paid and ran the side effects.
    Completed {
        subscription_link: String,
        expire_at: Timestamp,
        referral_credited: bool,
    },

    /// Another call got there first; nothing was done.
    AlreadyPaid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    Cancelled,
    AlreadyCancelled,
    /// Paid purchases are never downgraded.
    AlreadyPaid,
}

pub struct PaymentOrchestrator {
    purchases: Arc<dyn PurchaseRepository>,
    customers: Arc<dyn CustomerRepository>,
    referrals: Arc<dyn ReferralRepository>,
    provisioner: Arc<dyn SubscriptionProvisioner>,
    notifier: Arc<dyn Notifier>,
    catalog: Arc<dyn MessageCatalog>,
    backends: HashMap<BackendKind, Arc<dyn PaymentBackend>>,
    settings: OrchestratorSettings,
}

impl PaymentOrchestrator {
    pub fn new(
        purchases: Arc<dyn PurchaseRepository>,
        customers: Arc<dyn CustomerRepository>,
        referrals: Arc<dyn ReferralRepository>,
        provisioner: Arc<dyn SubscriptionProvisioner>,
        notifier: Arc<dyn Notifier>,
        catalog: Arc<dyn MessageCatalog>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            purchases,
            customers,
            referrals,
            provisioner,
            notifier,
            catalog,
            backends: HashMap::new(),
            settings,
        }
    }

    /// Registers the adapter for a backend, replacing any previous one.
    pub fn with_backend(mut self, backend: Arc<dyn PaymentBackend>) -> Self {
        self.backends.insert(backend.kind(), backend);
        self
    }

    // ════════════════════════════════════════════════════════════════════════
    // CreatePurchase
    // ════════════════════════════════════════════════════════════════════════

    #[tracing::instrument(skip(self, cmd), fields(customer_id = %cmd.customer_id, backend = %cmd.backend))]
    pub async fn create_purchase(
        &self,
        cmd: CreatePurchaseCommand,
    ) -> Result<CreatePurchaseResult, PurchaseError> {
        // 1. Resolve the adapter before any write
        let backend = self
            .backends
            .get(&cmd.backend)
            .cloned()
            .ok_or(PurchaseError::BackendUnavailable(cmd.backend))?;

        // 2. Validate input and owner
        let mut new_purchase =
            NewPurchase::new(cmd.customer_id, cmd.backend, cmd.months, cmd.amount);
        if let Some(currency) = cmd.currency {
            new_purchase = new_purchase.with_currency(currency);
        }
        new_purchase.validate()?;
        let customer = self.load_customer(cmd.customer_id).await?;

        // 3. Insert the `new` row
        let currency = new_purchase.currency.clone();
        let purchase_id = self.purchases.create(new_purchase).await?;

        // 4. Ask the backend for an invoice carrying the purchase id
        let request = InvoiceRequest {
            amount: cmd.amount,
            currency,
            months: cmd.months,
            title: self.catalog.text(&customer.language, messages::INVOICE_TITLE),
            description: self
                .catalog
                .text(&customer.language, messages::INVOICE_DESCRIPTION),
            payload: CallbackPayload::new(purchase_id)
                .with_customer(customer.id)
                .with_username(cmd.buyer.username.clone()),
            buyer: cmd.buyer,
        };

        let invoice = match backend.create_invoice(request).await {
            Ok(invoice) => invoice,
            Err(e) => {
                tracing::error!(
                    purchase_id = %purchase_id,
                    error = %e,
                    "Invoice creation failed, purchase left in new"
                );
                return Err(PurchaseError::invoice_creation_failed(
                    purchase_id,
                    e.to_string(),
                ));
            }
        };

        // 5. Record the correlation and move to pending
        self.purchases
            .update(purchase_id, PurchasePatch::invoice_created(invoice.correlation))
            .await?;

        tracing::info!(purchase_id = %purchase_id, "Purchase pending payment");

        Ok(CreatePurchaseResult {
            purchase_id,
            payment_url: invoice.pay_url,
        })
    }

    // ════════════════════════════════════════════════════════════════════════
    // Finalize
    // ════════════════════════════════════════════════════════════════════════

    #[tracing::instrument(skip(self, cmd), fields(purchase_id = %cmd.purchase_id))]
    pub async fn finalize(&self, cmd: FinalizeCommand) -> Result<FinalizeOutcome, PurchaseError> {
        // 1. Load the purchase and check where it stands
        let purchase = self
            .purchases
            .find_by_id(cmd.purchase_id)
            .await?
            .ok_or(PurchaseError::purchase_not_found(cmd.purchase_id))?;

        match purchase.status {
            PurchaseStatus::Paid => {
                tracing::debug!("Purchase already paid, skipping");
                return Ok(FinalizeOutcome::AlreadyPaid);
            }
            PurchaseStatus::New | PurchaseStatus::Cancelled => {
                return Err(PurchaseError::invalid_transition(
                    purchase.id,
                    purchase.status,
                    PurchaseStatus::Paid,
                ));
            }
            PurchaseStatus::Pending => {}
        }

        // 2. Load the owner
        let customer = self.load_customer(purchase.customer_id).await?;

        // 3. Grant access
        let account = self
            .provision(&customer, purchase.access_days(), self.settings.traffic_limit_bytes, cmd.username)
            .await?;

        // 4. Claim the purchase; losing means another caller already settled it
        let claimed = self
            .purchases
            .mark_paid_if_pending(purchase.id, Timestamp::now())
            .await?;
        if !claimed {
            tracing::warn!("Purchase settled concurrently, skipping side effects");
            return Ok(FinalizeOutcome::AlreadyPaid);
        }

        // 5. Record the new access on the customer
        self.customers
            .update(
                customer.id,
                CustomerPatch::access(account.expire_at, account.subscription_link.clone()),
            )
            .await?;

        // 6. Tell the buyer
        self.notify_activated(&customer, &account.subscription_link).await;

        // 7. Referral bonus, at most once per referee
        let referral_credited = match self.credit_referral(&customer).await {
            Ok(credited) => credited,
            Err(e) => {
                tracing::error!(customer_id = %customer.id, error = %e, "Referral credit failed");
                false
            }
        };

        tracing::info!(
            customer_id = %customer.id,
            expire_at = %account.expire_at,
            referral_credited,
            "Purchase finalized"
        );

        Ok(FinalizeOutcome::Completed {
            subscription_link: account.subscription_link,
            expire_at: account.expire_at,
            referral_credited,
        })
    }

    async fn notify_activated(&self, customer: &Customer, link: &str) {
        let notification = Notification::text(
            customer.telegram_id,
            self.catalog
                .text(&customer.language, messages::SUBSCRIPTION_ACTIVATED),
        )
        .with_action(NotificationAction::Url {
            label: self.catalog.text(&customer.language, messages::CONNECT_BUTTON),
            url: link.to_string(),
        });

        if let Err(e) = self.notifier.send(notification).await {
            tracing::warn!(customer_id = %customer.id, error = %e, "Activation notice not delivered");
        }
    }

    /// Extends the referrer once per referee. Returns true if this call granted it.
    async fn credit_referral(&self, referee: &Customer) -> Result<bool, PurchaseError> {
        let Some(referral) = self.referrals.find_by_referee(referee.id).await? else {
            return Ok(false);
        };
        if referral.bonus_granted {
            return Ok(false);
        }
        if !self.referrals.mark_bonus_granted(referral.id).await? {
            return Ok(false);
        }

        // Hand the claim back if the referrer could not be extended
        let (referrer, days) = match self.extend_referrer(referral.referrer_id).await {
            Ok(extended) => extended,
            Err(e) => {
                match self.referrals.release_bonus(referral.id).await {
                    Ok(_) => tracing::warn!(
                        referral_id = %referral.id,
                        "Referral bonus released for a later purchase"
                    ),
                    Err(release_err) => tracing::error!(
                        referral_id = %referral.id,
                        error = %release_err,
                        "Referral bonus claim could not be released"
                    ),
                }
                return Err(e);
            }
        };

        let template = self
            .catalog
            .text(&referrer.language, messages::REFERRAL_BONUS_GRANTED);
        let text = messages::render(&template, &[("days", &days.to_string())]);
        if let Err(e) = self
            .notifier
            .send(Notification::text(referrer.telegram_id, text))
            .await
        {
            tracing::warn!(customer_id = %referrer.id, error = %e, "Referral notice not delivered");
        }

        tracing::info!(
            referrer_id = %referrer.id,
            referee_id = %referee.id,
            days,
            "Referral bonus granted"
        );
        Ok(true)
    }

    async fn extend_referrer(&self, referrer_id: CustomerId) -> Result<(Customer, i64), PurchaseError> {
        let referrer = self.load_customer(referrer_id).await?;
        let days = self.settings.referral_bonus_days;
        let account = self
            .provision(&referrer, days, self.settings.traffic_limit_bytes, None)
            .await?;
        self.customers
            .update(
                referrer.id,
                CustomerPatch::access(account.expire_at, account.subscription_link),
            )
            .await?;
        Ok((referrer, days))
    }

    // ════════════════════════════════════════════════════════════════════════
    // CancelPayment
    // ════════════════════════════════════════════════════════════════════════

    #[tracing::instrument(skip(self))]
    pub async fn cancel_payment(&self, purchase_id: PurchaseId) -> Result<CancelOutcome, PurchaseError> {
        if self.purchases.cancel_if_open(purchase_id).await? {
            tracing::info!("Purchase cancelled");
            return Ok(CancelOutcome::Cancelled);
        }

        let purchase = self
            .purchases
            .find_by_id(purchase_id)
            .await?
            .ok_or(PurchaseError::purchase_not_found(purchase_id))?;

        match purchase.status {
            PurchaseStatus::Paid => {
                tracing::warn!("Cancel requested for a paid purchase, status kept");
                Ok(CancelOutcome::AlreadyPaid)
            }
            PurchaseStatus::Cancelled => Ok(CancelOutcome::AlreadyCancelled),
            // Reopened between the two reads; the ledger never does this.
            status => Err(PurchaseError::invalid_transition(
                purchase_id,
                status,
                PurchaseStatus::Cancelled,
            )),
        }
    }

    // ════════════════════════════════════════════════════════════════════════
    // ActivateTrial
    // ════════════════════════════════════════════════════════════════════════

    /// Grants the trial period without a purchase row.
    #[tracing::instrument(skip(self))]
    pub async fn activate_trial(
        &self,
        telegram_id: TelegramId,
    ) -> Result<Option<String>, PurchaseError> {
        if self.settings.trial_days == 0 {
            return Ok(None);
        }

        let customer = self
            .customers
            .find_by_telegram_id(telegram_id)
            .await?
            .ok_or(PurchaseError::customer_not_found_for_telegram(telegram_id))?;

        let account = self
            .provision(
                &customer,
                self.settings.trial_days,
                self.settings.trial_traffic_limit_bytes,
                None,
            )
            .await?;
        self.customers
            .update(
                customer.id,
                CustomerPatch::access(account.expire_at, account.subscription_link.clone()),
            )
            .await?;

        tracing::info!(customer_id = %customer.id, days = self.settings.trial_days, "Trial activated");
        Ok(Some(account.subscription_link))
    }

    // ════════════════════════════════════════════════════════════════════════
    // Helpers
    // ════════════════════════════════════════════════════════════════════════

    async fn load_customer(&self, id: CustomerId) -> Result<Customer, PurchaseError> {
        self.customers
            .find_by_id(id)
            .await?
            .ok_or(PurchaseError::customer_not_found(id))
    }

    async fn provision(
        &self,
        customer: &Customer,
        days: i64,
        traffic_limit_bytes: i64,
        username: Option<String>,
    ) -> Result<ProvisionedAccount, PurchaseError> {
        self.provisioner
            .create_or_update_account(ProvisionRequest {
                customer_id: customer.id,
                telegram_id: customer.telegram_id,
                traffic_limit_bytes,
                duration_days: days,
                username,
            })
            .await
            .map_err(|e| {
                tracing::error!(customer_id = %customer.id, error = %e, "Provisioning failed");
                PurchaseError::provisioning_failed(e.to_string())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::{
        settings, Fixture, KeyCatalog, MockBackend, MockNotifier, MockProvisioner,
        REFERRAL_DAYS, TRAFFIC_LIMIT, TRIAL_DAYS,
    };
    use crate::domain::purchase::InvoiceCorrelation;
    use crate::ports::ProvisionError;
    use async_trait::async_trait;

    fn crypto_command(customer_id: CustomerId) -> CreatePurchaseCommand {
        CreatePurchaseCommand {
            customer_id,
            amount: 900,
            months: 3,
            backend: BackendKind::Crypto,
            buyer: BuyerIdentity::username("alice"),
            currency: None,
        }
    }

    async fn pending_purchase(fx: &Fixture, customer_id: CustomerId) -> PurchaseId {
        fx.orchestrator
            .create_purchase(crypto_command(customer_id))
            .await
            .unwrap()
            .purchase_id
    }

    // ════════════════════════════════════════════════════════════════════════
    // CreatePurchase
    // ════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn create_purchase_moves_row_to_pending_with_correlation() {
        let fx = Fixture::new();
        let c1 = fx.customer(101).await;

        let result = fx.orchestrator.create_purchase(crypto_command(c1)).await.unwrap();

        let stored = fx.purchases.find_by_id(result.purchase_id).await.unwrap().unwrap();
        assert_eq!(stored.status, PurchaseStatus::Pending);
        assert_eq!(stored.amount, 900);
        assert_eq!(stored.currency, "RUB");
        assert!(matches!(stored.correlation, InvoiceCorrelation::Crypto { .. }));
        assert!(result.payment_url.starts_with("https://t.me/CryptoBot"));
    }

    #[tokio::test]
    async fn create_purchase_embeds_purchase_and_buyer_in_payload() {
        let backend = Arc::new(MockBackend::new(BackendKind::Gateway));
        let recorded = backend.clone();
        let fx = Fixture::build(MockProvisioner::new(), MockNotifier::new(), settings(), |o| {
            o.with_backend(backend)
        });
        let c1 = fx.customer(101).await;

        let result = fx
            .orchestrator
            .create_purchase(CreatePurchaseCommand {
                backend: BackendKind::Gateway,
                ..crypto_command(c1)
            })
            .await
            .unwrap();

        let request = recorded.requests().pop().unwrap();
        assert_eq!(request.payload.purchase_id, result.purchase_id);
        assert_eq!(request.payload.customer_id, Some(c1));
        assert_eq!(request.payload.username.as_deref(), Some("alice"));
        assert_eq!(request.title, "invoice_title");
    }

    #[tokio::test]
    async fn create_purchase_without_adapter_writes_nothing() {
        let fx = Fixture::build(MockProvisioner::new(), MockNotifier::new(), settings(), |o| o);
        let orchestrator = PaymentOrchestrator::new(
            fx.purchases.clone(),
            fx.customers.clone(),
            fx.referrals.clone(),
            fx.provisioner.clone(),
            fx.notifier.clone(),
            Arc::new(KeyCatalog),
            settings(),
        );
        let c1 = fx.customer(101).await;

        let err = orchestrator.create_purchase(crypto_command(c1)).await.unwrap_err();

        assert_eq!(err, PurchaseError::BackendUnavailable(BackendKind::Crypto));
        assert!(fx.purchases.all().await.is_empty());
    }

    #[tokio::test]
    async fn failed_invoice_leaves_purchase_new() {
        let fx = Fixture::build(MockProvisioner::new(), MockNotifier::new(), settings(), |o| {
            o.with_backend(Arc::new(MockBackend::failing(BackendKind::Crypto)))
        });
        let c1 = fx.customer(101).await;

        let err = fx.orchestrator.create_purchase(crypto_command(c1)).await.unwrap_err();

        let PurchaseError::InvoiceCreationFailed { purchase_id, .. } = err else {
            panic!("expected InvoiceCreationFailed, got {:?}", err);
        };
        let stored = fx.purchases.find_by_id(purchase_id).await.unwrap().unwrap();
        assert_eq!(stored.status, PurchaseStatus::New);
        assert!(stored.correlation.is_none());
    }

    #[tokio::test]
    async fn create_purchase_for_unknown_customer_fails() {
        let fx = Fixture::new();
        let err = fx
            .orchestrator
            .create_purchase(crypto_command(CustomerId::from_raw(404)))
            .await
            .unwrap_err();
        assert!(matches!(err, PurchaseError::CustomerNotFound(_)));
        assert!(fx.purchases.all().await.is_empty());
    }

    #[tokio::test]
    async fn create_purchase_rejects_plans_past_the_cap() {
        let fx = Fixture::new();
        let c1 = fx.customer(101).await;
        let err = fx
            .orchestrator
            .create_purchase(CreatePurchaseCommand {
                months: 10_000_000,
                ..crypto_command(c1)
            })
            .await
            .unwrap_err();
        assert!(matches!(err, PurchaseError::ValidationFailed { ref field, .. } if field == "months"));
        assert!(fx.purchases.all().await.is_empty());
        assert!(fx.provisioner.requests().is_empty());
    }

    #[tokio::test]
    async fn create_purchase_records_reported_currency() {
        let fx = Fixture::new();
        let c1 = fx.customer(101).await;

        let defaulted = pending_purchase(&fx, c1).await;
        let reported = fx
            .orchestrator
            .create_purchase(CreatePurchaseCommand {
                currency: Some("EUR".to_string()),
                ..crypto_command(c1)
            })
            .await
            .unwrap()
            .purchase_id;

        let defaulted = fx.purchases.find_by_id(defaulted).await.unwrap().unwrap();
        assert_eq!(defaulted.currency, BackendKind::Crypto.default_currency());
        let reported = fx.purchases.find_by_id(reported).await.unwrap().unwrap();
        assert_eq!(reported.currency, "EUR");
    }

    #[tokio::test]
    async fn create_purchase_rejects_zero_months() {
        let fx = Fixture::new();
        let c1 = fx.customer(101).await;
        let err = fx
            .orchestrator
            .create_purchase(CreatePurchaseCommand {
                months: 0,
                ..crypto_command(c1)
            })
            .await
            .unwrap_err();
        assert!(matches!(err, PurchaseError::ValidationFailed { ref field, .. } if field == "months"));
    }

    // ════════════════════════════════════════════════════════════════════════
    // Finalize
    // ════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn finalize_provisions_marks_paid_and_notifies() {
        let fx = Fixture::new();
        let c1 = fx.customer(101).await;
        let id = pending_purchase(&fx, c1).await;

        let outcome = fx.orchestrator.finalize(FinalizeCommand::new(id)).await.unwrap();

        let FinalizeOutcome::Completed {
            subscription_link,
            expire_at,
            referral_credited,
        } = outcome
        else {
            panic!("expected Completed");
        };
        assert!(!referral_credited);

        let requests = fx.provisioner.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].duration_days, 90);
        assert_eq!(requests[0].traffic_limit_bytes, TRAFFIC_LIMIT);

        let purchase = fx.purchases.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(purchase.status, PurchaseStatus::Paid);
        assert!(purchase.paid_at.is_some());

        let customer = fx.customers.find_by_id(c1).await.unwrap().unwrap();
        assert_eq!(customer.expire_at, Some(expire_at));
        assert_eq!(customer.subscription_link.as_deref(), Some(subscription_link.as_str()));

        let sent = fx.notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].text, "subscription_activated");
        assert_eq!(
            sent[0].action,
            Some(NotificationAction::Url {
                label: "connect_button".to_string(),
                url: subscription_link,
            })
        );
    }

    #[tokio::test]
    async fn finalize_twice_has_no_extra_effects() {
        let fx = Fixture::new();
        let c1 = fx.customer(101).await;
        let id = pending_purchase(&fx, c1).await;

        fx.orchestrator.finalize(FinalizeCommand::new(id)).await.unwrap();
        let second = fx.orchestrator.finalize(FinalizeCommand::new(id)).await.unwrap();

        assert_eq!(second, FinalizeOutcome::AlreadyPaid);
        assert_eq!(fx.provisioner.requests().len(), 1);
        assert_eq!(fx.notifier.sent().len(), 1);
    }

    #[tokio::test]
    async fn finalize_passes_username_to_provisioner() {
        let fx = Fixture::new();
        let c1 = fx.customer(101).await;
        let id = pending_purchase(&fx, c1).await;

        fx.orchestrator
            .finalize(FinalizeCommand::new(id).with_username(Some("alice".to_string())))
            .await
            .unwrap();

        assert_eq!(fx.provisioner.requests()[0].username.as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn referral_bonus_granted_once_across_purchases() {
        let fx = Fixture::new();
        let referrer = fx.customer(1).await;
        let referee = fx.customer(2).await;
        fx.referrals.create(referrer, referee).await.unwrap();

        let first = pending_purchase(&fx, referee).await;
        let outcome = fx.orchestrator.finalize(FinalizeCommand::new(first)).await.unwrap();
        assert!(matches!(
            outcome,
            FinalizeOutcome::Completed { referral_credited: true, .. }
        ));

        let second = pending_purchase(&fx, referee).await;
        let outcome = fx.orchestrator.finalize(FinalizeCommand::new(second)).await.unwrap();
        assert!(matches!(
            outcome,
            FinalizeOutcome::Completed { referral_credited: false, .. }
        ));

        assert_eq!(fx.provisioner.days_for(referrer), vec![REFERRAL_DAYS]);
        assert_eq!(fx.notifier.sent_to(TelegramId::from_raw(1)).len(), 1);
        assert_eq!(
            fx.notifier.sent_to(TelegramId::from_raw(1))[0].text,
            format!("bonus {}", REFERRAL_DAYS)
        );
        let referral = fx.referrals.find_by_referee(referee).await.unwrap().unwrap();
        assert!(referral.bonus_granted);

        let referrer_row = fx.customers.find_by_id(referrer).await.unwrap().unwrap();
        assert!(referrer_row.expire_at.is_some());
    }

    #[tokio::test]
    async fn referral_bonus_survives_referrer_provisioning_failure() {
        let fx = Fixture::new();
        let referrer = fx.customer(1).await;
        let referee = fx.customer(2).await;
        fx.referrals.create(referrer, referee).await.unwrap();
        fx.provisioner.fail_only_for(referrer);

        let first = pending_purchase(&fx, referee).await;
        let outcome = fx.orchestrator.finalize(FinalizeCommand::new(first)).await.unwrap();
        assert!(matches!(
            outcome,
            FinalizeOutcome::Completed { referral_credited: false, .. }
        ));
        let referral = fx.referrals.find_by_referee(referee).await.unwrap().unwrap();
        assert!(!referral.bonus_granted);
        let referrer_row = fx.customers.find_by_id(referrer).await.unwrap().unwrap();
        assert!(referrer_row.expire_at.is_none());

        fx.provisioner.recover();
        let second = pending_purchase(&fx, referee).await;
        let outcome = fx.orchestrator.finalize(FinalizeCommand::new(second)).await.unwrap();
        assert!(matches!(
            outcome,
            FinalizeOutcome::Completed { referral_credited: true, .. }
        ));
        let referral = fx.referrals.find_by_referee(referee).await.unwrap().unwrap();
        assert!(referral.bonus_granted);
        let referrer_row = fx.customers.find_by_id(referrer).await.unwrap().unwrap();
        assert!(referrer_row.expire_at.is_some());
    }

    #[tokio::test]
    async fn finalize_without_referral_leaves_referral_ledger_empty() {
        let fx = Fixture::new();
        let c1 = fx.customer(101).await;
        let id = pending_purchase(&fx, c1).await;

        fx.orchestrator.finalize(FinalizeCommand::new(id)).await.unwrap();

        assert!(fx.referrals.find_by_referee(c1).await.unwrap().is_none());
        assert_eq!(fx.provisioner.requests().len(), 1);
    }

    /// Provisioner that settles the purchase mid-call, like a poller winning the race.
    struct RacingProvisioner {
        purchases: Arc<dyn PurchaseRepository>,
        purchase_id: std::sync::Mutex<Option<PurchaseId>>,
        inner: MockProvisioner,
    }

    #[async_trait]
    impl SubscriptionProvisioner for RacingProvisioner {
        async fn create_or_update_account(
            &self,
            request: ProvisionRequest,
        ) -> Result<ProvisionedAccount, ProvisionError> {
            let id = *self.purchase_id.lock().unwrap();
            if let Some(id) = id {
                self.purchases.mark_paid_if_pending(id, Timestamp::now()).await.unwrap();
            }
            self.inner.create_or_update_account(request).await
        }
    }

    #[tokio::test]
    async fn finalize_that_loses_the_race_skips_side_effects() {
        let fx = Fixture::new();
        let referrer = fx.customer(1).await;
        let referee = fx.customer(2).await;
        fx.referrals.create(referrer, referee).await.unwrap();
        let id = pending_purchase(&fx, referee).await;

        let racing = Arc::new(RacingProvisioner {
            purchases: fx.purchases.clone(),
            purchase_id: std::sync::Mutex::new(Some(id)),
            inner: MockProvisioner::new(),
        });
        let orchestrator = PaymentOrchestrator::new(
            fx.purchases.clone(),
            fx.customers.clone(),
            fx.referrals.clone(),
            racing,
            fx.notifier.clone(),
            Arc::new(KeyCatalog),
            settings(),
        );

        let outcome = orchestrator.finalize(FinalizeCommand::new(id)).await.unwrap();

        assert_eq!(outcome, FinalizeOutcome::AlreadyPaid);
        assert!(fx.notifier.sent().is_empty());
        let referral = fx.referrals.find_by_referee(referee).await.unwrap().unwrap();
        assert!(!referral.bonus_granted);
    }

    #[tokio::test]
    async fn finalize_unknown_purchase_is_not_found() {
        let fx = Fixture::new();
        let err = fx
            .orchestrator
            .finalize(FinalizeCommand::new(PurchaseId::from_raw(999)))
            .await
            .unwrap_err();
        assert_eq!(err, PurchaseError::purchase_not_found(PurchaseId::from_raw(999)));
    }

    #[tokio::test]
    async fn finalize_new_or_cancelled_purchase_is_rejected() {
        let fx = Fixture::build(MockProvisioner::new(), MockNotifier::new(), settings(), |o| {
            o.with_backend(Arc::new(MockBackend::failing(BackendKind::Crypto)))
        });
        let c1 = fx.customer(101).await;
        let Err(PurchaseError::InvoiceCreationFailed { purchase_id, .. }) =
            fx.orchestrator.create_purchase(crypto_command(c1)).await
        else {
            panic!("expected invoice failure");
        };

        let err = fx
            .orchestrator
            .finalize(FinalizeCommand::new(purchase_id))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PurchaseError::InvalidTransition { current: PurchaseStatus::New, .. }
        ));

        let gateway = fx
            .orchestrator
            .create_purchase(CreatePurchaseCommand {
                backend: BackendKind::Gateway,
                ..crypto_command(c1)
            })
            .await
            .unwrap()
            .purchase_id;
        fx.orchestrator.cancel_payment(gateway).await.unwrap();
        let err = fx
            .orchestrator
            .finalize(FinalizeCommand::new(gateway))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PurchaseError::InvalidTransition { current: PurchaseStatus::Cancelled, .. }
        ));
        assert!(fx.provisioner.requests().is_empty());
    }

    #[tokio::test]
    async fn provisioning_failure_leaves_purchase_pending() {
        let fx = Fixture::build(MockProvisioner::failing(), MockNotifier::new(), settings(), |o| o);
        let c1 = fx.customer(101).await;
        let id = pending_purchase(&fx, c1).await;

        let err = fx.orchestrator.finalize(FinalizeCommand::new(id)).await.unwrap_err();

        assert!(matches!(err, PurchaseError::ProvisioningFailed(_)));
        assert!(err.is_retryable());
        let purchase = fx.purchases.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(purchase.status, PurchaseStatus::Pending);
        assert!(fx.notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn notifier_failure_does_not_fail_finalize() {
        let fx = Fixture::build(MockProvisioner::new(), MockNotifier::failing(), settings(), |o| o);
        let c1 = fx.customer(101).await;
        let id = pending_purchase(&fx, c1).await;

        let outcome = fx.orchestrator.finalize(FinalizeCommand::new(id)).await.unwrap();

        assert!(matches!(outcome, FinalizeOutcome::Completed { .. }));
        let purchase = fx.purchases.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(purchase.status, PurchaseStatus::Paid);
    }

    // ════════════════════════════════════════════════════════════════════════
    // CancelPayment
    // ════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn cancel_is_idempotent() {
        let fx = Fixture::new();
        let c1 = fx.customer(101).await;
        let id = pending_purchase(&fx, c1).await;

        assert_eq!(fx.orchestrator.cancel_payment(id).await.unwrap(), CancelOutcome::Cancelled);
        assert_eq!(
            fx.orchestrator.cancel_payment(id).await.unwrap(),
            CancelOutcome::AlreadyCancelled
        );
        let purchase = fx.purchases.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(purchase.status, PurchaseStatus::Cancelled);
    }

    #[tokio::test]
    async fn cancel_never_downgrades_paid() {
        let fx = Fixture::new();
        let c1 = fx.customer(101).await;
        let id = pending_purchase(&fx, c1).await;
        fx.orchestrator.finalize(FinalizeCommand::new(id)).await.unwrap();

        assert_eq!(fx.orchestrator.cancel_payment(id).await.unwrap(), CancelOutcome::AlreadyPaid);
        let purchase = fx.purchases.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(purchase.status, PurchaseStatus::Paid);
    }

    #[tokio::test]
    async fn cancel_unknown_purchase_is_not_found() {
        let fx = Fixture::new();
        let err = fx
            .orchestrator
            .cancel_payment(PurchaseId::from_raw(5))
            .await
            .unwrap_err();
        assert!(matches!(err, PurchaseError::PurchaseNotFound(_)));
    }

    // ════════════════════════════════════════════════════════════════════════
    // ActivateTrial
    // ════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn trial_provisions_without_purchase_row() {
        let fx = Fixture::new();
        let c1 = fx.customer(101).await;

        let link = fx
            .orchestrator
            .activate_trial(TelegramId::from_raw(101))
            .await
            .unwrap();

        assert!(link.is_some());
        assert!(fx.purchases.all().await.is_empty());
        let request = &fx.provisioner.requests()[0];
        assert_eq!(request.duration_days, TRIAL_DAYS);
        assert_eq!(request.traffic_limit_bytes, settings().trial_traffic_limit_bytes);
        let customer = fx.customers.find_by_id(c1).await.unwrap().unwrap();
        assert_eq!(customer.subscription_link, link);
    }

    #[tokio::test]
    async fn disabled_trial_is_a_no_op() {
        let disabled = OrchestratorSettings {
            trial_days: 0,
            ..settings()
        };
        let fx = Fixture::build(MockProvisioner::new(), MockNotifier::new(), disabled, |o| o);
        fx.customer(101).await;

        let link = fx
            .orchestrator
            .activate_trial(TelegramId::from_raw(101))
            .await
            .unwrap();

        assert_eq!(link, None);
        assert!(fx.provisioner.requests().is_empty());
    }

    #[tokio::test]
    async fn trial_for_unknown_customer_fails() {
        let fx = Fixture::new();
        let err = fx
            .orchestrator
            .activate_trial(TelegramId::from_raw(7))
            .await
            .unwrap_err();
        assert!(matches!(err, PurchaseError::CustomerNotFound(_)));
    }
}
