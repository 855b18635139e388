//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (IDs, timestamps, errors)
//! - `purchase` - Purchase lifecycle, backends and invoice correlation
//! - `customer` - Buyers and their current access
//! - `referral` - Referee → referrer links and the one-time bonus
//! - `webhook` - Signed push notifications from the subscription provider

pub mod customer;
pub mod foundation;
pub mod purchase;
pub mod referral;
pub mod webhook;
