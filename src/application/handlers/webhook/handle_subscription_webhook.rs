//! HandleSubscriptionWebhookHandler - turns a signed "new subscription" push
//! into a finalized purchase.
//!
//! The provider only sends this after it has charged the buyer, so the
//! purchase is created and finalized back to back.

use std::sync::Arc;

use crate::application::payment::{
    CreatePurchaseCommand, FinalizeCommand, FinalizeOutcome, PaymentOrchestrator,
};
use crate::domain::foundation::PurchaseId;
use crate::domain::purchase::BackendKind;
use crate::domain::webhook::{
    body_digest, SignatureVerifier, SubscriptionWebhookEvent, WebhookEnvelope, WebhookError,
};
use crate::ports::{BuyerIdentity, CustomerRepository, ProcessedWebhookStore, SaveResult};

/// Raw delivery, exactly as received.
#[derive(Debug, Clone)]
pub struct HandleSubscriptionWebhookCommand {
    pub body: Vec<u8>,
    pub signature: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandleSubscriptionWebhookResult {
    pub purchase_id: PurchaseId,
    /// False when a concurrent call had already settled the purchase.
    pub finalized: bool,
}

pub struct HandleSubscriptionWebhookHandler {
    verifier: SignatureVerifier,
    customers: Arc<dyn CustomerRepository>,
    processed: Arc<dyn ProcessedWebhookStore>,
    orchestrator: Arc<PaymentOrchestrator>,
}

impl HandleSubscriptionWebhookHandler {
    pub fn new(
        verifier: SignatureVerifier,
        customers: Arc<dyn CustomerRepository>,
        processed: Arc<dyn ProcessedWebhookStore>,
        orchestrator: Arc<PaymentOrchestrator>,
    ) -> Self {
        Self {
            verifier,
            customers,
            processed,
            orchestrator,
        }
    }

    /// `Err(Ignored)` and `Err(Duplicate)` are acknowledgements, not failures.
    pub async fn handle(
        &self,
        cmd: HandleSubscriptionWebhookCommand,
    ) -> Result<HandleSubscriptionWebhookResult, WebhookError> {
        // 1. Verify signature over the exact bytes
        self.verifier.verify(&cmd.body, cmd.signature.as_deref())?;

        // 2. Filter on the event name, then decode the payload
        let envelope = WebhookEnvelope::parse(&cmd.body)?;
        if !envelope.is_new_subscription() {
            tracing::debug!(event = %envelope.name, "Ignoring subscription webhook");
            return Err(WebhookError::Ignored(envelope.name));
        }
        let event = envelope.into_subscription()?;

        // 3. Acknowledge exact redeliveries of a processed body
        let key = body_digest(&cmd.body);
        if self
            .processed
            .contains(&key)
            .await
            .map_err(|e| WebhookError::Storage(e.to_string()))?
        {
            tracing::info!(key = %key, "Duplicate subscription webhook");
            return Err(WebhookError::Duplicate);
        }

        // 4. Resolve the buyer
        let telegram_id = event.payload.telegram_user_id;
        let customer = self
            .customers
            .find_by_telegram_id(telegram_id)
            .await
            .map_err(|e| WebhookError::Storage(e.to_string()))?
            .ok_or(WebhookError::CustomerNotFound(telegram_id))?;

        // 5. Create and settle the purchase
        let months = event.months();
        let created = self
            .orchestrator
            .create_purchase(CreatePurchaseCommand {
                customer_id: customer.id,
                amount: event.payload.amount,
                months,
                backend: BackendKind::SubscriptionWebhook,
                buyer: BuyerIdentity::default(),
                currency: reported_currency(&event),
            })
            .await
            .map_err(|e| WebhookError::Processing(e.to_string()))?;

        let outcome = self
            .orchestrator
            .finalize(FinalizeCommand::new(created.purchase_id))
            .await
            .map_err(|e| {
                tracing::error!(purchase_id = %created.purchase_id, error = %e, "Webhook finalize failed");
                WebhookError::Processing(e.to_string())
            })?;

        // 6. Remember the body so a redelivery is acknowledged without a second purchase
        match self.processed.record(&key).await {
            Ok(SaveResult::Inserted) => {}
            Ok(SaveResult::AlreadyExists) => {
                tracing::warn!(key = %key, "Subscription webhook processed concurrently");
            }
            Err(e) => {
                tracing::error!(key = %key, error = %e, "Could not record processed webhook");
            }
        }

        tracing::info!(
            purchase_id = %created.purchase_id,
            customer_id = %customer.id,
            months,
            "Subscription webhook processed"
        );

        Ok(HandleSubscriptionWebhookResult {
            purchase_id: created.purchase_id,
            finalized: matches!(outcome, FinalizeOutcome::Completed { .. }),
        })
    }
}

/// Provider currency codes arrive lower-case; blank means "not reported".
fn reported_currency(event: &SubscriptionWebhookEvent) -> Option<String> {
    event
        .payload
        .currency
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_uppercase)
}
