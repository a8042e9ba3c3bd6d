//! Capital calls module - scheduling, lifecycle and payments.

mod capital_calls_errors;
mod capital_calls_model;
mod capital_calls_service;
mod capital_calls_traits;
mod idempotency;
mod ledger;
mod reconciler;
mod scheduler;


pub use capital_calls_errors::CapitalCallError;
pub use capital_calls_model::*;
pub use capital_calls_service::CapitalCallService;
pub use capital_calls_traits::{CapitalCallRepositoryTrait, CapitalCallServiceTrait};
pub use idempotency::{compute_payment_fingerprint, fingerprint_new_payment};
pub use ledger::CapitalCallLedger;
pub use reconciler::{PaymentDecision, PaymentReconciler, ReconciledPayment};
pub use scheduler::{
    CapitalCallScheduler, CustomCallEntry, ScheduleExpansion, ScheduleKind, ScheduleSpec,
    MAX_SCHEDULE_CALLS,
};
