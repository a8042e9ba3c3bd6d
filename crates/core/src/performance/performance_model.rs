use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Deal-level metrics for one allocation, computed on demand.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AllocationPerformance {
    pub allocation_id: String,
    pub fund_id: String,
    pub deal_id: String,
    pub committed_amount: Decimal,
    /// Sum of payments over the allocation's non-deleted calls.
    pub paid_in: Decimal,
    pub unfunded_commitment: Decimal,
    pub distributions: Decimal,
    pub market_value: Decimal,
    pub total_value: Decimal,
    pub moic: Decimal,
    pub tvpi: Decimal,
    pub dpi: Decimal,
    pub rvpi: Decimal,
    pub irr_approx: Decimal,
    /// Share of the fund's total commitments.
    pub portfolio_weight: Decimal,
    pub age_years: Decimal,
    pub as_of: DateTime<Utc>,
}

/// Fund-level aggregation over all allocations of a fund.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FundPerformance {
    pub fund_id: String,
    pub total_allocated: Decimal,
    pub paid_in: Decimal,
    pub distributions: Decimal,
    pub market_value: Decimal,
    pub total_value: Decimal,
    pub moic: Decimal,
    pub tvpi: Decimal,
    pub dpi: Decimal,
    pub rvpi: Decimal,
    pub irr_approx: Decimal,
    /// Measured from the earliest commitment date.
    pub age_years: Decimal,
    pub as_of: DateTime<Utc>,
    pub allocations: Vec<AllocationPerformance>,
}
