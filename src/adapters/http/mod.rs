//! HTTP adapters - the inbound surface.
//!
//! Only the subscription provider calls in; everything else this service
//! does is driven by pollers and the chat front end.

mod health;
mod router;
pub mod webhook;

pub use router::{app_router, health_router, HttpSettings};
pub use webhook::{webhook_router, WebhookAppState};
