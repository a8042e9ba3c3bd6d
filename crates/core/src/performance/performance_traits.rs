use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::performance_model::{AllocationPerformance, FundPerformance};
use crate::errors::Result;

/// Read-only performance queries. Nothing computed here is stored.
pub trait PerformanceServiceTrait: Send + Sync {
    fn allocation_performance(
        &self,
        allocation_id: &str,
        as_of: DateTime<Utc>,
    ) -> Result<AllocationPerformance>;

    fn fund_performance(&self, fund_id: &str, as_of: DateTime<Utc>) -> Result<FundPerformance>;

    /// Cash-flow-dated IRR of an allocation: payments are outflows on their
    /// payment dates, distributions plus market value one inflow at `as_of`.
    ///
    /// `None` when there is not yet both an outflow and an inflow.
    fn cash_flow_irr(&self, allocation_id: &str, as_of: DateTime<Utc>) -> Result<Option<Decimal>>;
}
