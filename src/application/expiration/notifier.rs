//! ExpirationNotifier - daily pass over customers whose access is about to lapse.
//!
//! Customers with an open subscription-webhook purchase and exactly one
//! calendar day left are renewed on the same terms, since the provider
//! charges them automatically. Everyone else in the window gets a
//! reminder with a renew button. A successful renewal suppresses the
//! reminder; a failed one does not.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::application::messages;
use crate::application::payment::{
    CreatePurchaseCommand, FinalizeCommand, FinalizeOutcome, PaymentOrchestrator,
};
use crate::domain::customer::Customer;
use crate::domain::foundation::{CustomerId, DomainError, Timestamp};
use crate::domain::purchase::{BackendKind, Purchase, PurchaseError};
use crate::ports::{
    BuyerIdentity, CustomerRepository, MessageCatalog, Notification, NotificationAction,
    Notifier, PurchaseRepository,
};

#[derive(Debug, Clone)]
pub struct ExpirationConfig {
    /// Hour of day (UTC) the pass runs.
    pub run_hour_utc: u32,
    pub lookahead_days: i64,
}

impl Default for ExpirationConfig {
    fn default() -> Self {
        Self {
            run_hour_utc: 16,
            lookahead_days: 3,
        }
    }
}

impl ExpirationConfig {
    /// Next run strictly after `now`.
    pub fn next_run_after(&self, now: Timestamp) -> Timestamp {
        let today = now.start_of_day().add_hours(i64::from(self.run_hour_utc.min(23)));
        if today.is_after(&now) {
            today
        } else {
            today.add_days(1)
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExpirationReport {
    pub renewed: usize,
    pub reminded: usize,
    /// Renewals or reminders that failed; logged and left for the next pass.
    pub skipped_failures: usize,
}

pub fn spawn_expiration_notifier(
    notifier: ExpirationNotifier,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move { notifier.run(shutdown).await })
}

pub struct ExpirationNotifier {
    customers: Arc<dyn CustomerRepository>,
    purchases: Arc<dyn PurchaseRepository>,
    orchestrator: Arc<PaymentOrchestrator>,
    notifier: Arc<dyn Notifier>,
    catalog: Arc<dyn MessageCatalog>,
    config: ExpirationConfig,
}

impl ExpirationNotifier {
    pub fn new(
        customers: Arc<dyn CustomerRepository>,
        purchases: Arc<dyn PurchaseRepository>,
        orchestrator: Arc<PaymentOrchestrator>,
        notifier: Arc<dyn Notifier>,
        catalog: Arc<dyn MessageCatalog>,
    ) -> Self {
        Self {
            customers,
            purchases,
            orchestrator,
            notifier,
            catalog,
            config: ExpirationConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ExpirationConfig) -> Self {
        self.config = config;
        self
    }

    /// Sleeps until each scheduled hour and runs a pass, until shutdown.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        loop {
            let now = Timestamp::now();
            let next = self.config.next_run_after(now);
            let wait = (*next.as_datetime() - *now.as_datetime())
                .to_std()
                .unwrap_or(Duration::ZERO);
            tracing::info!(next_run = %next, "Expiration notifier scheduled");

            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        tracing::info!("Expiration notifier stopped");
                        return;
                    }
                }

                _ = tokio::time::sleep(wait) => {
                    match self.run_once(Timestamp::now()).await {
                        Ok(report) => tracing::info!(?report, "Expiration pass finished"),
                        Err(e) => tracing::error!(error = %e, "Expiration pass failed"),
                    }
                }
            }
        }
    }

    /// One pass over customers expiring within the look-ahead window.
    pub async fn run_once(&self, now: Timestamp) -> Result<ExpirationReport, DomainError> {
        let until = now.add_days(self.config.lookahead_days);
        let expiring = self.customers.find_by_expiration_range(now, until).await?;
        if expiring.is_empty() {
            return Ok(ExpirationReport::default());
        }

        let ids: Vec<CustomerId> = expiring.iter().map(|c| c.id).collect();
        let subscriptions: HashMap<CustomerId, Purchase> = self
            .purchases
            .find_latest_open_by_customers(BackendKind::SubscriptionWebhook, &ids)
            .await?
            .into_iter()
            .map(|p| (p.customer_id, p))
            .collect();

        let mut report = ExpirationReport::default();
        for customer in expiring {
            let Some(expire_at) = customer.expire_at else {
                continue;
            };
            let days_left = now.whole_days_until(&expire_at);

            if let Some(subscription) = subscriptions.get(&customer.id) {
                if days_left == 1 {
                    match self.renew(subscription).await {
                        Ok(()) => {
                            report.renewed += 1;
                            continue;
                        }
                        Err(e) => {
                            tracing::error!(customer_id = %customer.id, error = %e, "Auto-renew failed");
                            report.skipped_failures += 1;
                        }
                    }
                }
            }

            // Subscription customers still get a reminder unless renewed above
            if self.remind(&customer, expire_at).await {
                report.reminded += 1;
            } else {
                report.skipped_failures += 1;
            }
        }

        Ok(report)
    }

    async fn renew(&self, previous: &Purchase) -> Result<(), PurchaseError> {
        let created = self
            .orchestrator
            .create_purchase(CreatePurchaseCommand {
                customer_id: previous.customer_id,
                amount: previous.amount,
                months: previous.months,
                backend: BackendKind::SubscriptionWebhook,
                buyer: BuyerIdentity::default(),
                currency: Some(previous.currency.clone()),
            })
            .await?;

        match self
            .orchestrator
            .finalize(FinalizeCommand::new(created.purchase_id))
            .await?
        {
            FinalizeOutcome::Completed { expire_at, .. } => {
                tracing::info!(
                    customer_id = %previous.customer_id,
                    purchase_id = %created.purchase_id,
                    expire_at = %expire_at,
                    "Subscription auto-renewed"
                );
            }
            FinalizeOutcome::AlreadyPaid => {}
        }
        Ok(())
    }

    async fn remind(&self, customer: &Customer, expire_at: Timestamp) -> bool {
        let template = self
            .catalog
            .text(&customer.language, messages::SUBSCRIPTION_EXPIRING);
        let text = messages::render(&template, &[("date", &expire_at.format_date())]);
        let notification = Notification::text(customer.telegram_id, text).with_action(
            NotificationAction::Callback {
                label: self
                    .catalog
                    .text(&customer.language, messages::RENEW_SUBSCRIPTION_BUTTON),
                data: messages::BUY_CALLBACK.to_string(),
            },
        );

        match self.notifier.send(notification).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(customer_id = %customer.id, error = %e, "Expiry reminder not delivered");
                false
            }
        }
    }
}
