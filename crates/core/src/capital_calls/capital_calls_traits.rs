//! Capital call repository and service traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::capital_calls_model::{
    CallReminder, CallSpec, CapitalCall, CapitalCallDatesUpdate, CapitalCallPayment,
    CapitalCallStatus, CapitalCallStatusUpdate, CreatedCapitalCall, NewCapitalCall,
    NewCapitalCallPayment, PaymentApplication, RecordedPayment, ScheduledCalls, StatusTransition,
    UpdatedCapitalCall,
};
use super::scheduler::{ScheduleExpansion, ScheduleSpec};
use crate::errors::Result;

/// Persistence contract for capital calls and their payments.
///
/// Every mutating method is one write transaction. Implementations re-read the
/// call inside that transaction and decide with the pure ledger/reconciler
/// functions, so concurrent requests never act on stale state.
#[async_trait]
pub trait CapitalCallRepositoryTrait: Send + Sync {
    /// Inserts all calls or none.
    async fn create_calls(
        &self,
        allocation_id: &str,
        calls: Vec<CallSpec>,
        initial_status: CapitalCallStatus,
    ) -> Result<Vec<CapitalCall>>;

    /// Explicit status edit, validated with `CapitalCallLedger::transition_call`.
    async fn apply_transition(
        &self,
        call_id: &str,
        target: CapitalCallStatus,
        expected_paid: Option<Decimal>,
    ) -> Result<StatusTransition>;

    /// Date edit, validated with `CapitalCallLedger::check_reschedule`.
    async fn update_dates(
        &self,
        call_id: &str,
        call_date: DateTime<Utc>,
        due_date: DateTime<Utc>,
    ) -> Result<CapitalCall>;

    /// Sets the tombstone. Deleting twice is a no-op.
    async fn soft_delete(&self, call_id: &str) -> Result<CapitalCall>;

    /// Reconciles and stores a payment, then updates the call and the
    /// allocation status, all in one transaction.
    async fn record_payment(&self, payment: NewCapitalCallPayment) -> Result<PaymentApplication>;

    /// Returns the call even when deleted.
    fn get_by_id(&self, call_id: &str) -> Result<CapitalCall>;

    fn list_by_allocation(
        &self,
        allocation_id: &str,
        include_deleted: bool,
    ) -> Result<Vec<CapitalCall>>;

    /// Non-deleted calls across all allocations of a deal.
    fn list_by_deal(&self, deal_id: &str) -> Result<Vec<CapitalCall>>;

    /// Non-deleted calls whose call date or due date lies in `[start, end]`.
    fn list_in_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<CapitalCall>>;

    /// Non-deleted calls in `scheduled`, `called` or `partial`.
    fn list_open(&self) -> Result<Vec<CapitalCall>>;

    /// Payments of a call, oldest first.
    fn list_payments(&self, call_id: &str) -> Result<Vec<CapitalCallPayment>>;
}

/// Operations offered to the rest of the application.
#[async_trait]
pub trait CapitalCallServiceTrait: Send + Sync {
    async fn create_capital_call(&self, new_call: NewCapitalCall) -> Result<CreatedCapitalCall>;

    /// Expands a schedule without persisting anything.
    fn preview_schedule(&self, allocation_id: &str, spec: &ScheduleSpec)
        -> Result<ScheduleExpansion>;

    async fn create_schedule(&self, allocation_id: &str, spec: ScheduleSpec)
        -> Result<ScheduledCalls>;

    async fn update_status(&self, update: CapitalCallStatusUpdate) -> Result<UpdatedCapitalCall>;

    /// `scheduled → called`.
    async fn issue_capital_call(&self, call_id: &str) -> Result<UpdatedCapitalCall>;

    async fn mark_defaulted(&self, call_id: &str) -> Result<UpdatedCapitalCall>;

    async fn update_dates(&self, update: CapitalCallDatesUpdate) -> Result<UpdatedCapitalCall>;

    async fn delete_capital_call(&self, call_id: &str) -> Result<UpdatedCapitalCall>;

    async fn add_payment(&self, payment: NewCapitalCallPayment) -> Result<RecordedPayment>;

    fn get_capital_call(&self, call_id: &str) -> Result<CapitalCall>;

    fn get_payments(&self, call_id: &str) -> Result<Vec<CapitalCallPayment>>;

    fn list_by_allocation(&self, allocation_id: &str) -> Result<Vec<CapitalCall>>;

    fn list_by_deal(&self, deal_id: &str) -> Result<Vec<CapitalCall>>;

    /// Calls with a call date or due date in `[start, end]`, ordered by call date.
    fn list_calendar(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<CapitalCall>>;

    /// Open calls past their due date plus grace period at `now`.
    fn list_overdue(&self, now: DateTime<Utc>) -> Result<Vec<CapitalCall>>;

    /// Reminders for open calls falling in `[start, end]`, earliest first.
    fn reminders_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CallReminder>>;
}
