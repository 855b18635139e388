//! Customer module - buyers known to the Customer Directory.

mod aggregate;

pub use aggregate::{Customer, CustomerPatch, NewCustomer, DEFAULT_LANGUAGE};
