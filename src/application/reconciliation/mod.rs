//! Reconciliation pollers - turn backend-reported invoice status into
//! Finalize / CancelPayment calls.

mod poller;

pub use poller::{spawn_poller, InvoicePoller, PollReport, PollerConfig};
