//! Content fingerprints for payment deduplication.
//!
//! A payment retried with the same idempotency key must carry the same
//! content. The fingerprint captures that content so a replay can be told
//! apart from a conflicting reuse of the key.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};

use super::capital_calls_model::{NewCapitalCallPayment, PaymentMethod};

/// SHA-256 over the semantic content of a payment, hex encoded.
///
/// Covers the call id, amount, payment date (day precision), method and
/// notes. `recorded_by` is not part of the fingerprint.
pub fn compute_payment_fingerprint(
    capital_call_id: &str,
    payment_amount: Decimal,
    payment_date: &DateTime<Utc>,
    payment_method: PaymentMethod,
    notes: Option<&str>,
) -> String {
    let mut hasher = Sha256::new();

    hasher.update(capital_call_id.as_bytes());
    hasher.update(b"|");
    hasher.update(payment_amount.normalize().to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(payment_date.format("%Y-%m-%d").to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(payment_method.as_str().as_bytes());
    hasher.update(b"|");
    if let Some(notes) = notes {
        hasher.update(normalize_notes(notes).as_bytes());
    }

    hex::encode(hasher.finalize())
}

pub fn fingerprint_new_payment(payment: &NewCapitalCallPayment) -> String {
    compute_payment_fingerprint(
        &payment.capital_call_id,
        payment.payment_amount,
        &payment.payment_date,
        payment.payment_method,
        payment.notes.as_deref(),
    )
}

fn normalize_notes(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn payment() -> NewCapitalCallPayment {
        NewCapitalCallPayment {
            capital_call_id: "call-1".to_string(),
            payment_amount: dec!(40000),
            payment_date: Utc.with_ymd_and_hms(2025, 2, 1, 12, 0, 0).unwrap(),
            payment_method: PaymentMethod::Wire,
            notes: Some("first  tranche".to_string()),
            idempotency_key: Some("k-1".to_string()),
            recorded_by: Some("ops".to_string()),
        }
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let fp = fingerprint_new_payment(&payment());
        assert_eq!(fp.len(), 64);
        assert_eq!(fp, fingerprint_new_payment(&payment()));
    }

    #[test]
    fn test_fingerprint_ignores_formatting_noise() {
        let mut other = payment();
        other.payment_amount = dec!(40000.00);
        other.payment_date = Utc.with_ymd_and_hms(2025, 2, 1, 18, 30, 0).unwrap();
        other.notes = Some(" first tranche ".to_string());
        other.recorded_by = None;
        assert_eq!(fingerprint_new_payment(&payment()), fingerprint_new_payment(&other));
    }

    #[test]
    fn test_fingerprint_changes_with_content() {
        let base = fingerprint_new_payment(&payment());

        let mut amount = payment();
        amount.payment_amount = dec!(40001);
        assert_ne!(base, fingerprint_new_payment(&amount));

        let mut method = payment();
        method.payment_method = PaymentMethod::Ach;
        assert_ne!(base, fingerprint_new_payment(&method));

        let mut call = payment();
        call.capital_call_id = "call-2".to_string();
        assert_ne!(base, fingerprint_new_payment(&call));
    }
}
