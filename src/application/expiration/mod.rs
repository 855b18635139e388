//! Expiration notifier - daily renewal and reminder pass.

mod notifier;

pub use notifier::{
    spawn_expiration_notifier, ExpirationConfig, ExpirationNotifier, ExpirationReport,
};
