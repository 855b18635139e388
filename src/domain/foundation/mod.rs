//! Foundation module - Shared domain primitives.
//!
//! Contains identifiers, time, the state machine contract and the error
//! types that the purchase, customer and referral modules build on.

mod errors;
mod ids;
mod state_machine;
mod timestamp;

pub use errors::{DomainError, ErrorCode, ValidationError};
pub use ids::{CustomerId, PurchaseId, ReferralId, TelegramId};
pub use state_machine::StateMachine;
pub use timestamp::Timestamp;
