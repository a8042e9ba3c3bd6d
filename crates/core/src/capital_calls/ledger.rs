//! Capital call state machine.
//!
//! ```text
//! scheduled ──issue──▶ called ──payment──▶ partial ──payment──▶ paid
//!     │                  │  └────────full payment─────────────▲
//!     │                  │                    │
//!     └──────────────────┴──────default───────┴──▶ defaulted
//! ```
//!
//! `paid` and `defaulted` are terminal. A payment received while a call is
//! still `scheduled` is treated as an implicit issue.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::capital_calls_errors::CapitalCallError;
use super::capital_calls_model::{CapitalCall, CapitalCallStatus};
use crate::errors::{Result, ValidationError};

pub struct CapitalCallLedger;

impl CapitalCallLedger {
    /// Status implied by the cumulative paid amount.
    ///
    /// `paid_amount` must lie in `[0, call_amount]`; overpayment is expected to
    /// be rejected before this is called.
    pub fn next_status(
        current: CapitalCallStatus,
        paid_amount: Decimal,
        call_amount: Decimal,
    ) -> std::result::Result<CapitalCallStatus, CapitalCallError> {
        if paid_amount < Decimal::ZERO || paid_amount > call_amount {
            return Err(CapitalCallError::PaidAmountOutOfRange {
                paid_amount,
                call_amount,
            });
        }

        let candidate = if paid_amount.is_zero() {
            current
        } else if paid_amount < call_amount {
            CapitalCallStatus::Partial
        } else {
            CapitalCallStatus::Paid
        };

        if current.is_terminal() {
            return Err(CapitalCallError::InvalidTransition {
                from: current,
                to: candidate,
            });
        }

        Ok(candidate)
    }

    /// Explicit administrative transition.
    ///
    /// Only issuing (`scheduled → called`) and defaulting an open call are
    /// allowed; `partial` and `paid` are reachable through payments alone.
    pub fn transition(
        current: CapitalCallStatus,
        target: CapitalCallStatus,
    ) -> std::result::Result<CapitalCallStatus, CapitalCallError> {
        use CapitalCallStatus::*;

        match (current, target) {
            (Scheduled, Called) => Ok(Called),
            (Scheduled | Called | Partial, Defaulted) => Ok(Defaulted),
            _ => Err(CapitalCallError::InvalidTransition {
                from: current,
                to: target,
            }),
        }
    }

    pub fn accepts_payments(status: CapitalCallStatus) -> bool {
        !status.is_terminal()
    }

    /// Validates an explicit status edit against the stored call.
    ///
    /// A supplied `expected_paid` must match the paid amount derived from
    /// payments; it can never be used to set the paid amount directly.
    pub fn transition_call(
        call: &CapitalCall,
        target: CapitalCallStatus,
        expected_paid: Option<Decimal>,
    ) -> Result<CapitalCallStatus> {
        ensure_not_deleted(call)?;
        if let Some(expected) = expected_paid {
            if expected != call.paid_amount {
                return Err(ValidationError::field(
                    "paidAmount",
                    format!(
                        "paid amount is derived from payments ({}), got {}",
                        call.paid_amount, expected
                    ),
                )
                .into());
            }
        }
        Ok(Self::transition(call.status, target)?)
    }

    /// Validates a call/due date edit against the stored call.
    pub fn check_reschedule(
        call: &CapitalCall,
        call_date: DateTime<Utc>,
        due_date: DateTime<Utc>,
    ) -> Result<()> {
        ensure_not_deleted(call)?;
        if call.status.is_terminal() {
            return Err(CapitalCallError::CallClosed {
                call_id: call.id.clone(),
                reason: call.status.to_string(),
            }
            .into());
        }
        if due_date <= call_date {
            return Err(ValidationError::field(
                "dueDate",
                format!("must fall after the call date {}", call_date.date_naive()),
            )
            .into());
        }
        Ok(())
    }
}

fn ensure_not_deleted(call: &CapitalCall) -> Result<()> {
    if call.is_deleted {
        return Err(CapitalCallError::CallClosed {
            call_id: call.id.clone(),
            reason: "deleted".to_string(),
        }
        .into());
    }
    Ok(())
}
