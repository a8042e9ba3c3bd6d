//! Allocation (commitment) domain models.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{errors::ValidationError, Error, Result};

/// Funding status of a commitment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AllocationStatus {
    /// Nothing paid yet
    #[default]
    Committed,
    /// Some capital paid, less than committed
    PartiallyPaid,
    /// Paid in full
    Funded,
    /// Administratively marked as not going to fund
    Unfunded,
}

impl AllocationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AllocationStatus::Committed => "committed",
            AllocationStatus::PartiallyPaid => "partially_paid",
            AllocationStatus::Funded => "funded",
            AllocationStatus::Unfunded => "unfunded",
        }
    }
}

impl fmt::Display for AllocationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AllocationStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "committed" => Ok(AllocationStatus::Committed),
            "partially_paid" => Ok(AllocationStatus::PartiallyPaid),
            "funded" => Ok(AllocationStatus::Funded),
            "unfunded" => Ok(AllocationStatus::Unfunded),
            other => Err(ValidationError::field(
                "status",
                format!("unknown allocation status '{}'", other),
            )
            .into()),
        }
    }
}

/// Recomputes an allocation's status from the capital paid against it.
///
/// `unfunded` is sticky and never left automatically.
pub fn derive_allocation_status(
    current: AllocationStatus,
    total_paid: Decimal,
    committed_amount: Decimal,
) -> AllocationStatus {
    if current == AllocationStatus::Unfunded {
        return current;
    }
    if total_paid <= Decimal::ZERO {
        AllocationStatus::Committed
    } else if total_paid < committed_amount {
        AllocationStatus::PartiallyPaid
    } else {
        AllocationStatus::Funded
    }
}

/// A fund's commitment to a deal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Allocation {
    pub id: String,
    pub fund_id: String,
    pub deal_id: String,
    pub committed_amount: Decimal,
    pub commitment_date: DateTime<Utc>,
    pub status: AllocationStatus,
    /// Cumulative distributions paid back to the fund.
    pub distributions_paid: Decimal,
    /// Current valuation of the residual position.
    pub market_value: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input model for creating a new allocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAllocation {
    pub id: Option<String>,
    pub fund_id: String,
    pub deal_id: String,
    pub committed_amount: Decimal,
    pub commitment_date: DateTime<Utc>,
    #[serde(default)]
    pub distributions_paid: Decimal,
    #[serde(default)]
    pub market_value: Decimal,
}

impl NewAllocation {
    pub fn validate(&self) -> Result<()> {
        if self.fund_id.trim().is_empty() {
            return Err(ValidationError::MissingField("fundId".to_string()).into());
        }
        if self.deal_id.trim().is_empty() {
            return Err(ValidationError::MissingField("dealId".to_string()).into());
        }
        if self.committed_amount <= Decimal::ZERO {
            return Err(ValidationError::field(
                "committedAmount",
                format!("must be positive, got {}", self.committed_amount),
            )
            .into());
        }
        validate_non_negative("distributionsPaid", self.distributions_paid)?;
        validate_non_negative("marketValue", self.market_value)
    }
}

/// Update of the performance inputs of an allocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationPerformanceUpdate {
    pub id: String,
    pub distributions_paid: Option<Decimal>,
    pub market_value: Option<Decimal>,
}

impl AllocationPerformanceUpdate {
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::MissingField("id".to_string()).into());
        }
        if self.distributions_paid.is_none() && self.market_value.is_none() {
            return Err(ValidationError::InvalidInput(
                "Nothing to update: provide distributionsPaid or marketValue".to_string(),
            )
            .into());
        }
        if let Some(value) = self.distributions_paid {
            validate_non_negative("distributionsPaid", value)?;
        }
        if let Some(value) = self.market_value {
            validate_non_negative("marketValue", value)?;
        }
        Ok(())
    }
}

fn validate_non_negative(field: &str, value: Decimal) -> Result<()> {
    if value < Decimal::ZERO {
        return Err(ValidationError::field(field, format!("cannot be negative, got {}", value)).into());
    }
    Ok(())
}
