//! Applies a payment to a capital call.
//!
//! Runs inside the storage transaction against a freshly read call and its
//! payments, so the decision is made on a consistent snapshot.

use rust_decimal::Decimal;

use super::capital_calls_errors::CapitalCallError;
use super::capital_calls_model::{
    CapitalCall, CapitalCallPayment, CapitalCallStatus, NewCapitalCallPayment,
};
use super::idempotency::fingerprint_new_payment;
use super::ledger::CapitalCallLedger;
use crate::errors::{Result, ValidationError};

/// New state of a call after a payment is accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciledPayment {
    pub paid_amount: Decimal,
    pub remaining_amount: Decimal,
    pub status: CapitalCallStatus,
    pub fingerprint: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PaymentDecision {
    /// Insert the payment and update the call.
    Apply(ReconciledPayment),
    /// The idempotency key was already used for this exact payment.
    Replay(CapitalCallPayment),
}

pub struct PaymentReconciler;

impl PaymentReconciler {
    /// Decides how `payment` affects `call`.
    ///
    /// The paid amount is re-derived from `existing` instead of trusting
    /// `call.paid_amount`.
    pub fn reconcile(
        call: &CapitalCall,
        existing: &[CapitalCallPayment],
        payment: &NewCapitalCallPayment,
    ) -> Result<PaymentDecision> {
        payment.validate()?;
        let fingerprint = fingerprint_new_payment(payment);

        if let Some(key) = payment.idempotency_key.as_deref() {
            if let Some(previous) = existing
                .iter()
                .find(|p| p.idempotency_key.as_deref() == Some(key))
            {
                if previous.fingerprint == fingerprint {
                    return Ok(PaymentDecision::Replay(previous.clone()));
                }
                return Err(ValidationError::field(
                    "idempotencyKey",
                    format!(
                        "key '{}' was already used for a different payment on capital call {}",
                        key, call.id
                    ),
                )
                .into());
            }
        }

        if call.is_deleted {
            return Err(CapitalCallError::CallClosed {
                call_id: call.id.clone(),
                reason: "deleted".to_string(),
            }
            .into());
        }
        if !CapitalCallLedger::accepts_payments(call.status) {
            return Err(CapitalCallError::CallClosed {
                call_id: call.id.clone(),
                reason: call.status.to_string(),
            }
            .into());
        }

        let already_paid: Decimal = existing.iter().map(|p| p.payment_amount).sum();
        let paid_amount = already_paid + payment.payment_amount;
        if paid_amount > call.call_amount {
            return Err(CapitalCallError::OverpaymentRejected {
                call_id: call.id.clone(),
                call_amount: call.call_amount,
                already_paid,
                attempted: payment.payment_amount,
            }
            .into());
        }

        let status = CapitalCallLedger::next_status(call.status, paid_amount, call.call_amount)?;

        Ok(PaymentDecision::Apply(ReconciledPayment {
            paid_amount,
            remaining_amount: call.call_amount - paid_amount,
            status,
            fingerprint,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capital_calls::{AmountType, PaymentMethod};
    use crate::errors::Error;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn call(status: CapitalCallStatus) -> CapitalCall {
        let at = Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap();
        CapitalCall {
            id: "call-1".to_string(),
            allocation_id: "alloc-1".to_string(),
            call_amount: dec!(100000),
            amount_type: AmountType::Dollar,
            source_percentage: None,
            call_date: at,
            due_date: at + chrono::Duration::days(10),
            status,
            paid_amount: Decimal::ZERO,
            notes: None,
            is_deleted: false,
            deleted_at: None,
            created_at: at,
            updated_at: at,
        }
    }

    fn new_payment(amount: Decimal, key: Option<&str>) -> NewCapitalCallPayment {
        NewCapitalCallPayment {
            capital_call_id: "call-1".to_string(),
            payment_amount: amount,
            payment_date: Utc.with_ymd_and_hms(2025, 1, 20, 12, 0, 0).unwrap(),
            payment_method: PaymentMethod::Wire,
            notes: None,
            idempotency_key: key.map(str::to_string),
            recorded_by: None,
        }
    }

    fn stored(new: &NewCapitalCallPayment, id: &str) -> CapitalCallPayment {
        CapitalCallPayment {
            id: id.to_string(),
            capital_call_id: new.capital_call_id.clone(),
            payment_amount: new.payment_amount,
            payment_date: new.payment_date,
            payment_method: new.payment_method,
            notes: new.notes.clone(),
            idempotency_key: new.idempotency_key.clone(),
            fingerprint: fingerprint_new_payment(new),
            recorded_by: None,
            created_at: new.payment_date,
        }
    }

    fn applied(decision: PaymentDecision) -> ReconciledPayment {
        match decision {
            PaymentDecision::Apply(r) => r,
            other => panic!("expected Apply, got {:?}", other),
        }
    }

    #[test]
    fn test_partial_then_paid() {
        let first = new_payment(dec!(40000), None);
        let r = applied(PaymentReconciler::reconcile(&call(CapitalCallStatus::Called), &[], &first).unwrap());
        assert_eq!(r.paid_amount, dec!(40000));
        assert_eq!(r.remaining_amount, dec!(60000));
        assert_eq!(r.status, CapitalCallStatus::Partial);

        let existing = vec![stored(&first, "p1")];
        let second = new_payment(dec!(60000), None);
        let r = applied(
            PaymentReconciler::reconcile(&call(CapitalCallStatus::Partial), &existing, &second)
                .unwrap(),
        );
        assert_eq!(r.paid_amount, dec!(100000));
        assert_eq!(r.remaining_amount, Decimal::ZERO);
        assert_eq!(r.status, CapitalCallStatus::Paid);
    }

    #[test]
    fn test_overpayment_rejected() {
        let existing = vec![stored(&new_payment(dec!(90000), None), "p1")];
        let err = PaymentReconciler::reconcile(
            &call(CapitalCallStatus::Partial),
            &existing,
            &new_payment(dec!(10000.01), None),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            Error::CapitalCall(CapitalCallError::OverpaymentRejected { already_paid, .. })
                if already_paid == dec!(90000)
        ));
    }

    #[test]
    fn test_closed_calls_reject_payments() {
        for status in [CapitalCallStatus::Paid, CapitalCallStatus::Defaulted] {
            let err = PaymentReconciler::reconcile(&call(status), &[], &new_payment(dec!(1), None))
                .unwrap_err();
            assert!(matches!(err, Error::CapitalCall(CapitalCallError::CallClosed { .. })));
        }

        let mut deleted = call(CapitalCallStatus::Called);
        deleted.is_deleted = true;
        assert!(PaymentReconciler::reconcile(&deleted, &[], &new_payment(dec!(1), None)).is_err());
    }

    #[test]
    fn test_scheduled_call_payment() {
        let r = applied(
            PaymentReconciler::reconcile(
                &call(CapitalCallStatus::Scheduled),
                &[],
                &new_payment(dec!(100000), None),
            )
            .unwrap(),
        );
        assert_eq!(r.status, CapitalCallStatus::Paid);
    }

    #[test]
    fn test_replay_with_same_key_and_content() {
        let first = new_payment(dec!(40000), Some("wire-7"));
        let existing = vec![stored(&first, "p1")];
        let decision =
            PaymentReconciler::reconcile(&call(CapitalCallStatus::Partial), &existing, &first)
                .unwrap();
        assert!(matches!(decision, PaymentDecision::Replay(p) if p.id == "p1"));
    }

    #[test]
    fn test_replay_on_closed_call_still_returns_original() {
        let first = new_payment(dec!(100000), Some("wire-7"));
        let existing = vec![stored(&first, "p1")];
        let decision =
            PaymentReconciler::reconcile(&call(CapitalCallStatus::Paid), &existing, &first).unwrap();
        assert!(matches!(decision, PaymentDecision::Replay(_)));
    }

    #[test]
    fn test_key_reuse_with_different_content() {
        let existing = vec![stored(&new_payment(dec!(40000), Some("wire-7")), "p1")];
        let err = PaymentReconciler::reconcile(
            &call(CapitalCallStatus::Partial),
            &existing,
            &new_payment(dec!(50000), Some("wire-7")),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_non_positive_amount() {
        for amount in [Decimal::ZERO, dec!(-5)] {
            assert!(matches!(
                PaymentReconciler::reconcile(
                    &call(CapitalCallStatus::Called),
                    &[],
                    &new_payment(amount, None)
                ),
                Err(Error::Validation(_))
            ));
        }
    }
}
