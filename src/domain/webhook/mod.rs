//! Webhook module - inbound push notifications from the subscription provider.

mod errors;
mod event;
mod verifier;

pub use errors::WebhookError;
pub use event::{
    SubscriptionPayload, SubscriptionWebhookEvent, WebhookEnvelope, NEW_SUBSCRIPTION_EVENT,
};
pub use verifier::{body_digest, SignatureVerifier, SIGNATURE_HEADER};

#[cfg(test)]
pub use verifier::sign_for_tests;
