//! Capital call domain models.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result, ValidationError};

/// Lifecycle status of a capital call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CapitalCallStatus {
    #[default]
    Scheduled,
    Called,
    Partial,
    Paid,
    Defaulted,
}

impl CapitalCallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CapitalCallStatus::Scheduled => "scheduled",
            CapitalCallStatus::Called => "called",
            CapitalCallStatus::Partial => "partial",
            CapitalCallStatus::Paid => "paid",
            CapitalCallStatus::Defaulted => "defaulted",
        }
    }

    /// `paid` and `defaulted` accept no further changes.
    pub fn is_terminal(&self) -> bool {
        matches!(self, CapitalCallStatus::Paid | CapitalCallStatus::Defaulted)
    }
}

impl fmt::Display for CapitalCallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CapitalCallStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "scheduled" => Ok(CapitalCallStatus::Scheduled),
            "called" => Ok(CapitalCallStatus::Called),
            "partial" => Ok(CapitalCallStatus::Partial),
            "paid" => Ok(CapitalCallStatus::Paid),
            "defaulted" => Ok(CapitalCallStatus::Defaulted),
            other => Err(ValidationError::field("status", format!("unknown status '{}'", other)).into()),
        }
    }
}

/// How the magnitude of a call was originally expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AmountType {
    Percentage,
    Dollar,
}

impl AmountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AmountType::Percentage => "percentage",
            AmountType::Dollar => "dollar",
        }
    }
}

impl FromStr for AmountType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "percentage" => Ok(AmountType::Percentage),
            "dollar" => Ok(AmountType::Dollar),
            other => Err(
                ValidationError::field("amountType", format!("unknown amount type '{}'", other))
                    .into(),
            ),
        }
    }
}

/// A call magnitude as supplied by the user.
///
/// Resolved to an absolute amount exactly once, when the call is created. The
/// variant survives only as provenance on the stored call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum CallAmount {
    /// Percentage of the commitment, e.g. `25` for a quarter.
    Percentage(Decimal),
    /// Absolute currency amount.
    Dollar(Decimal),
}

impl CallAmount {
    pub fn amount_type(&self) -> AmountType {
        match self {
            CallAmount::Percentage(_) => AmountType::Percentage,
            CallAmount::Dollar(_) => AmountType::Dollar,
        }
    }

    pub fn magnitude(&self) -> Decimal {
        match self {
            CallAmount::Percentage(value) | CallAmount::Dollar(value) => *value,
        }
    }
}

/// Payment instrument used to settle a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    #[default]
    Wire,
    Check,
    Ach,
    Other,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Wire => "wire",
            PaymentMethod::Check => "check",
            PaymentMethod::Ach => "ach",
            PaymentMethod::Other => "other",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "wire" => Ok(PaymentMethod::Wire),
            "check" => Ok(PaymentMethod::Check),
            "ach" => Ok(PaymentMethod::Ach),
            "other" => Ok(PaymentMethod::Other),
            other => Err(ValidationError::field(
                "paymentMethod",
                format!("unknown payment method '{}'", other),
            )
            .into()),
        }
    }
}

/// Domain model representing one scheduled draw against an allocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CapitalCall {
    pub id: String,
    pub allocation_id: String,
    pub call_amount: Decimal,
    pub amount_type: AmountType,
    /// Percentage the amount was resolved from, when `amount_type` is `percentage`.
    pub source_percentage: Option<Decimal>,
    pub call_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub status: CapitalCallStatus,
    pub paid_amount: Decimal,
    pub notes: Option<String>,
    /// Removal tombstone, independent of `status`.
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CapitalCall {
    pub fn remaining_amount(&self) -> Decimal {
        (self.call_amount - self.paid_amount).max(Decimal::ZERO)
    }

    /// Open calls are neither terminal nor deleted.
    pub fn is_open(&self) -> bool {
        !self.is_deleted && !self.status.is_terminal()
    }
}

/// Input model for creating a single capital call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCapitalCall {
    pub allocation_id: String,
    pub call_amount: CallAmount,
    pub call_date: DateTime<Utc>,
    /// Defaults to the configured number of days after the call date.
    pub due_date: Option<DateTime<Utc>>,
    /// Initial status; only `scheduled` (default) or `called` are accepted.
    pub status: Option<CapitalCallStatus>,
    pub notes: Option<String>,
}

impl NewCapitalCall {
    pub fn validate(&self) -> Result<()> {
        if self.allocation_id.trim().is_empty() {
            return Err(ValidationError::MissingField("allocationId".to_string()).into());
        }
        match self.status {
            None | Some(CapitalCallStatus::Scheduled) | Some(CapitalCallStatus::Called) => Ok(()),
            Some(other) => Err(ValidationError::field(
                "status",
                format!("a new capital call cannot start as '{}'", other),
            )
            .into()),
        }
    }
}

/// A fully resolved call, ready to be persisted.
///
/// Produced by the scheduler: dates are normalized, `due_date > call_date`,
/// and `call_amount` is an absolute, positive amount.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CallSpec {
    pub call_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub call_amount: Decimal,
    pub amount_type: AmountType,
    pub source_percentage: Option<Decimal>,
    pub notes: Option<String>,
}

/// Explicit status edit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapitalCallStatusUpdate {
    pub id: String,
    pub status: CapitalCallStatus,
    /// Accepted only when it matches the amount already recorded through payments.
    pub paid_amount: Option<Decimal>,
}

/// Explicit call/due date edit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapitalCallDatesUpdate {
    pub id: String,
    pub call_date: DateTime<Utc>,
    /// Recomputed from the call date when omitted.
    pub due_date: Option<DateTime<Utc>>,
}

/// Domain model for a payment recorded against a capital call. Immutable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CapitalCallPayment {
    pub id: String,
    pub capital_call_id: String,
    pub payment_amount: Decimal,
    pub payment_date: DateTime<Utc>,
    pub payment_method: PaymentMethod,
    pub notes: Option<String>,
    pub idempotency_key: Option<String>,
    pub fingerprint: String,
    pub recorded_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Input model for recording a payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCapitalCallPayment {
    pub capital_call_id: String,
    pub payment_amount: Decimal,
    pub payment_date: DateTime<Utc>,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    pub notes: Option<String>,
    /// Client-supplied key that makes retries of the same payment harmless.
    pub idempotency_key: Option<String>,
    /// Acting user, for audit attribution.
    pub recorded_by: Option<String>,
}

impl NewCapitalCallPayment {
    pub fn validate(&self) -> Result<()> {
        if self.capital_call_id.trim().is_empty() {
            return Err(ValidationError::MissingField("capitalCallId".to_string()).into());
        }
        if self.payment_amount <= Decimal::ZERO {
            return Err(ValidationError::field(
                "paymentAmount",
                format!("must be positive, got {}", self.payment_amount),
            )
            .into());
        }
        if let Some(key) = &self.idempotency_key {
            if key.trim().is_empty() {
                return Err(
                    ValidationError::field("idempotencyKey", "cannot be blank").into(),
                );
            }
        }
        Ok(())
    }
}

/// Result of applying a payment inside the storage transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentApplication {
    pub capital_call: CapitalCall,
    pub payment: CapitalCallPayment,
    pub payments: Vec<CapitalCallPayment>,
    /// True when an earlier payment with the same idempotency key was returned.
    pub replayed: bool,
}

/// Result of a status edit inside the storage transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusTransition {
    pub capital_call: CapitalCall,
    /// Status read in the same transaction, before the edit.
    pub previous_status: CapitalCallStatus,
}

/// A call after a status, date or delete edit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatedCapitalCall {
    pub capital_call: CapitalCall,
    pub warnings: Vec<String>,
}

/// Result of `add_payment` as seen by callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordedPayment {
    pub capital_call: CapitalCall,
    pub payment: CapitalCallPayment,
    pub payments: Vec<CapitalCallPayment>,
    pub replayed: bool,
    /// Non-fatal problems, e.g. the timeline entry could not be written.
    pub warnings: Vec<String>,
}

/// A single call created through `create_capital_call`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedCapitalCall {
    pub capital_call: CapitalCall,
    pub warnings: Vec<String>,
}

/// Calls created from one schedule, plus any policy warnings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledCalls {
    pub capital_calls: Vec<CapitalCall>,
    pub warnings: Vec<String>,
}

/// A reminder owed for an open call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CallReminder {
    pub capital_call_id: String,
    pub allocation_id: String,
    pub remind_on: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub outstanding_amount: Decimal,
}
