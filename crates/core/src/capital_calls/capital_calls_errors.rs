//! Business-rule errors for capital calls and their payments.

use rust_decimal::Decimal;
use thiserror::Error;

use super::capital_calls_model::CapitalCallStatus;

/// Rejections raised by the ledger and the payment reconciler.
///
/// None of these are corrected silently: the caller receives the error and the
/// stored call is left untouched.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CapitalCallError {
    #[error("Cannot move capital call from '{from}' to '{to}'")]
    InvalidTransition {
        from: CapitalCallStatus,
        to: CapitalCallStatus,
    },

    #[error("Capital call {call_id} is closed ({reason}) and accepts no further changes")]
    CallClosed { call_id: String, reason: String },

    #[error(
        "Payment of {attempted} on capital call {call_id} exceeds the outstanding amount (call amount {call_amount}, already paid {already_paid})"
    )]
    OverpaymentRejected {
        call_id: String,
        call_amount: Decimal,
        already_paid: Decimal,
        attempted: Decimal,
    },

    #[error("Paid amount {paid_amount} is outside the range of call amount {call_amount}")]
    PaidAmountOutOfRange {
        paid_amount: Decimal,
        call_amount: Decimal,
    },
}
