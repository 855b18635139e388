//! Payment orchestration - the purchase lifecycle's write side.

mod orchestrator;

pub use orchestrator::{
    CancelOutcome, CreatePurchaseCommand, CreatePurchaseResult, FinalizeCommand, FinalizeOutcome,
    OrchestratorSettings, PaymentOrchestrator,
};
