//! Domain event types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::capital_calls::CapitalCallStatus;

/// Domain events emitted by core services after successful mutations.
///
/// Runtime adapters translate them into notifications, cache invalidation
/// or dashboard refreshes.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    /// Allocations were created, updated or deleted.
    AllocationsChanged {
        allocation_ids: Vec<String>,
        fund_ids: Vec<String>,
        deal_ids: Vec<String>,
    },

    /// A schedule (or a single call) was persisted for an allocation.
    CapitalCallsScheduled {
        allocation_id: String,
        capital_call_ids: Vec<String>,
    },

    /// A call's status or dates changed, or it was deleted.
    CapitalCallChanged {
        capital_call_id: String,
        allocation_id: String,
        status: CapitalCallStatus,
    },

    /// A new payment was applied. Not emitted for idempotent replays.
    PaymentRecorded {
        capital_call_id: String,
        allocation_id: String,
        payment_id: String,
        amount: Decimal,
        status: CapitalCallStatus,
    },
}

impl DomainEvent {
    pub fn allocations_changed(
        allocation_ids: Vec<String>,
        fund_ids: Vec<String>,
        deal_ids: Vec<String>,
    ) -> Self {
        Self::AllocationsChanged {
            allocation_ids,
            fund_ids,
            deal_ids,
        }
    }

    pub fn capital_calls_scheduled(allocation_id: String, capital_call_ids: Vec<String>) -> Self {
        Self::CapitalCallsScheduled {
            allocation_id,
            capital_call_ids,
        }
    }

    pub fn capital_call_changed(
        capital_call_id: String,
        allocation_id: String,
        status: CapitalCallStatus,
    ) -> Self {
        Self::CapitalCallChanged {
            capital_call_id,
            allocation_id,
            status,
        }
    }

    pub fn payment_recorded(
        capital_call_id: String,
        allocation_id: String,
        payment_id: String,
        amount: Decimal,
        status: CapitalCallStatus,
    ) -> Self {
        Self::PaymentRecorded {
            capital_call_id,
            allocation_id,
            payment_id,
            amount,
            status,
        }
    }
}
