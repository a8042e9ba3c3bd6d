use chrono::{DateTime, Utc};
use log::debug;
use rust_decimal::Decimal;
use std::sync::Arc;

use super::calculator::PerformanceCalculator;
use super::performance_model::{AllocationPerformance, FundPerformance};
use super::performance_traits::PerformanceServiceTrait;
use crate::allocations::{Allocation, AllocationRepositoryTrait};
use crate::capital_calls::CapitalCallRepositoryTrait;
use crate::errors::{Error, Result};

pub struct PerformanceService {
    allocation_repository: Arc<dyn AllocationRepositoryTrait>,
    capital_call_repository: Arc<dyn CapitalCallRepositoryTrait>,
}

impl PerformanceService {
    pub fn new(
        allocation_repository: Arc<dyn AllocationRepositoryTrait>,
        capital_call_repository: Arc<dyn CapitalCallRepositoryTrait>,
    ) -> Self {
        Self {
            allocation_repository,
            capital_call_repository,
        }
    }

    fn paid_in(&self, allocation_id: &str) -> Result<Decimal> {
        Ok(self
            .capital_call_repository
            .list_by_allocation(allocation_id, false)?
            .iter()
            .map(|call| call.paid_amount)
            .sum())
    }

    fn metrics(
        &self,
        allocation: &Allocation,
        fund_total: Decimal,
        as_of: DateTime<Utc>,
    ) -> Result<AllocationPerformance> {
        let paid_in = self.paid_in(&allocation.id)?;
        let committed = allocation.committed_amount;
        let total_value = allocation.distributions_paid + allocation.market_value;
        let age_years =
            PerformanceCalculator::years_between(allocation.commitment_date.date_naive(), as_of.date_naive());

        Ok(AllocationPerformance {
            allocation_id: allocation.id.clone(),
            fund_id: allocation.fund_id.clone(),
            deal_id: allocation.deal_id.clone(),
            committed_amount: committed,
            paid_in,
            unfunded_commitment: (committed - paid_in).max(Decimal::ZERO),
            distributions: allocation.distributions_paid,
            market_value: allocation.market_value,
            total_value,
            moic: PerformanceCalculator::moic(
                committed,
                allocation.distributions_paid,
                allocation.market_value,
            ),
            tvpi: PerformanceCalculator::tvpi(total_value, committed),
            dpi: PerformanceCalculator::dpi(allocation.distributions_paid, committed),
            rvpi: PerformanceCalculator::rvpi(allocation.market_value, committed),
            irr_approx: PerformanceCalculator::irr_approx(total_value, committed, age_years),
            portfolio_weight: PerformanceCalculator::portfolio_weight(committed, fund_total),
            age_years: age_years.round_dp(4),
            as_of,
        })
    }

    fn fund_total(&self, fund_id: &str) -> Result<Decimal> {
        Ok(self
            .allocation_repository
            .list_by_fund(fund_id)?
            .iter()
            .map(|a| a.committed_amount)
            .sum())
    }
}

impl PerformanceServiceTrait for PerformanceService {
    fn allocation_performance(
        &self,
        allocation_id: &str,
        as_of: DateTime<Utc>,
    ) -> Result<AllocationPerformance> {
        let allocation = self.allocation_repository.get_by_id(allocation_id)?;
        let fund_total = self.fund_total(&allocation.fund_id)?;
        self.metrics(&allocation, fund_total, as_of)
    }

    fn fund_performance(&self, fund_id: &str, as_of: DateTime<Utc>) -> Result<FundPerformance> {
        let allocations = self.allocation_repository.list_by_fund(fund_id)?;
        if allocations.is_empty() {
            return Err(Error::not_found("fund", fund_id));
        }

        let total_allocated: Decimal = allocations.iter().map(|a| a.committed_amount).sum();
        let per_allocation = allocations
            .iter()
            .map(|a| self.metrics(a, total_allocated, as_of))
            .collect::<Result<Vec<_>>>()?;

        let paid_in: Decimal = per_allocation.iter().map(|p| p.paid_in).sum();
        let distributions: Decimal = per_allocation.iter().map(|p| p.distributions).sum();
        let market_value: Decimal = per_allocation.iter().map(|p| p.market_value).sum();
        let total_value = distributions + market_value;
        let earliest = allocations
            .iter()
            .map(|a| a.commitment_date.date_naive())
            .min()
            .unwrap_or_else(|| as_of.date_naive());
        let age_years = PerformanceCalculator::years_between(earliest, as_of.date_naive());
        debug!(
            "Fund {} performance over {} allocations: total value {} on {} allocated",
            fund_id,
            per_allocation.len(),
            total_value,
            total_allocated
        );

        Ok(FundPerformance {
            fund_id: fund_id.to_string(),
            total_allocated,
            paid_in,
            distributions,
            market_value,
            total_value,
            moic: PerformanceCalculator::moic(total_allocated, distributions, market_value),
            tvpi: PerformanceCalculator::tvpi(total_value, total_allocated),
            dpi: PerformanceCalculator::dpi(distributions, total_allocated),
            rvpi: PerformanceCalculator::rvpi(market_value, total_allocated),
            irr_approx: PerformanceCalculator::irr_approx(total_value, total_allocated, age_years),
            age_years: age_years.round_dp(4),
            as_of,
            allocations: per_allocation,
        })
    }

    fn cash_flow_irr(&self, allocation_id: &str, as_of: DateTime<Utc>) -> Result<Option<Decimal>> {
        let allocation = self.allocation_repository.get_by_id(allocation_id)?;
        let mut flows = Vec::new();
        for call in self
            .capital_call_repository
            .list_by_allocation(allocation_id, false)?
        {
            for payment in self.capital_call_repository.list_payments(&call.id)? {
                flows.push((payment.payment_date.date_naive(), -payment.payment_amount));
            }
        }
        let terminal = allocation.distributions_paid + allocation.market_value;
        if flows.is_empty() || terminal <= Decimal::ZERO {
            return Ok(None);
        }
        flows.push((as_of.date_naive(), terminal));
        flows.sort_by_key(|(date, _)| *date);

        PerformanceCalculator::xirr(&flows).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocations::{AllocationPerformanceUpdate, AllocationStatus, NewAllocation};
    use crate::capital_calls::{
        AmountType, CallSpec, CapitalCall, CapitalCallPayment, CapitalCallStatus,
        NewCapitalCallPayment, PaymentApplication, PaymentMethod, StatusTransition,
    };
    use async_trait::async_trait;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use std::sync::Mutex;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    #[derive(Default)]
    struct Fixture {
        allocations: Mutex<Vec<Allocation>>,
        calls: Mutex<Vec<CapitalCall>>,
        payments: Mutex<Vec<CapitalCallPayment>>,
    }

    impl Fixture {
        fn allocation(
            &self,
            id: &str,
            committed: Decimal,
            distributions: Decimal,
            market_value: Decimal,
            commitment_date: DateTime<Utc>,
        ) {
            self.allocations.lock().unwrap().push(Allocation {
                id: id.to_string(),
                fund_id: "fund-1".to_string(),
                deal_id: format!("deal-{}", id),
                committed_amount: committed,
                commitment_date,
                status: AllocationStatus::Committed,
                distributions_paid: distributions,
                market_value,
                created_at: commitment_date,
                updated_at: commitment_date,
            });
        }

        fn paid_call(&self, allocation_id: &str, amount: Decimal, paid_on: DateTime<Utc>, deleted: bool) {
            let call_id = format!("call-{}", self.calls.lock().unwrap().len());
            self.calls.lock().unwrap().push(CapitalCall {
                id: call_id.clone(),
                allocation_id: allocation_id.to_string(),
                call_amount: amount,
                amount_type: AmountType::Dollar,
                source_percentage: None,
                call_date: paid_on,
                due_date: paid_on + chrono::Duration::days(10),
                status: CapitalCallStatus::Paid,
                paid_amount: amount,
                notes: None,
                is_deleted: deleted,
                deleted_at: None,
                created_at: paid_on,
                updated_at: paid_on,
            });
            self.payments.lock().unwrap().push(CapitalCallPayment {
                id: format!("pay-{}", call_id),
                capital_call_id: call_id,
                payment_amount: amount,
                payment_date: paid_on,
                payment_method: PaymentMethod::Wire,
                notes: None,
                idempotency_key: None,
                fingerprint: String::new(),
                recorded_by: None,
                created_at: paid_on,
            });
        }
    }

    #[async_trait]
    impl AllocationRepositoryTrait for Fixture {
        async fn create(&self, _new_allocation: NewAllocation) -> Result<Allocation> {
            unimplemented!()
        }
        async fn update_performance(&self, _update: AllocationPerformanceUpdate) -> Result<Allocation> {
            unimplemented!()
        }
        async fn update_status(&self, _id: &str, _status: AllocationStatus) -> Result<Allocation> {
            unimplemented!()
        }
        async fn delete(&self, _id: &str) -> Result<usize> {
            unimplemented!()
        }
        fn get_by_id(&self, allocation_id: &str) -> Result<Allocation> {
            self.allocations
                .lock()
                .unwrap()
                .iter()
                .find(|a| a.id == allocation_id)
                .cloned()
                .ok_or_else(|| Error::not_found("allocation", allocation_id))
        }
        fn list_by_fund(&self, fund_id: &str) -> Result<Vec<Allocation>> {
            Ok(self
                .allocations
                .lock()
                .unwrap()
                .iter()
                .filter(|a| a.fund_id == fund_id)
                .cloned()
                .collect())
        }
        fn list_by_deal(&self, _deal_id: &str) -> Result<Vec<Allocation>> {
            unimplemented!()
        }
    }

    #[async_trait]
    impl CapitalCallRepositoryTrait for Fixture {
        async fn create_calls(
            &self,
            _allocation_id: &str,
            _calls: Vec<CallSpec>,
            _initial_status: CapitalCallStatus,
        ) -> Result<Vec<CapitalCall>> {
            unimplemented!()
        }
        async fn apply_transition(
            &self,
            _call_id: &str,
            _target: CapitalCallStatus,
            _expected_paid: Option<Decimal>,
        ) -> Result<StatusTransition> {
            unimplemented!()
        }
        async fn update_dates(
            &self,
            _call_id: &str,
            _call_date: DateTime<Utc>,
            _due_date: DateTime<Utc>,
        ) -> Result<CapitalCall> {
            unimplemented!()
        }
        async fn soft_delete(&self, _call_id: &str) -> Result<CapitalCall> {
            unimplemented!()
        }
        async fn record_payment(&self, _payment: NewCapitalCallPayment) -> Result<PaymentApplication> {
            unimplemented!()
        }
        fn get_by_id(&self, _call_id: &str) -> Result<CapitalCall> {
            unimplemented!()
        }
        fn list_by_allocation(
            &self,
            allocation_id: &str,
            include_deleted: bool,
        ) -> Result<Vec<CapitalCall>> {
            Ok(self
                .calls
                .lock()
                .unwrap()
                .iter()
                .filter(|c| c.allocation_id == allocation_id && (include_deleted || !c.is_deleted))
                .cloned()
                .collect())
        }
        fn list_by_deal(&self, _deal_id: &str) -> Result<Vec<CapitalCall>> {
            unimplemented!()
        }
        fn list_in_range(&self, _start: DateTime<Utc>, _end: DateTime<Utc>) -> Result<Vec<CapitalCall>> {
            unimplemented!()
        }
        fn list_open(&self) -> Result<Vec<CapitalCall>> {
            unimplemented!()
        }
        fn list_payments(&self, call_id: &str) -> Result<Vec<CapitalCallPayment>> {
            Ok(self
                .payments
                .lock()
                .unwrap()
                .iter()
                .filter(|p| p.capital_call_id == call_id)
                .cloned()
                .collect())
        }
    }

    fn service(fixture: Fixture) -> PerformanceService {
        let fixture = Arc::new(fixture);
        PerformanceService::new(fixture.clone(), fixture)
    }

    #[test]
    fn test_allocation_metrics() {
        let fixture = Fixture::default();
        fixture.allocation("a", dec!(500000), dec!(50000), dec!(600000), at(2023, 1, 1));
        fixture.allocation("b", dec!(1500000), Decimal::ZERO, Decimal::ZERO, at(2024, 1, 1));
        fixture.paid_call("a", dec!(300000), at(2023, 2, 1), false);
        fixture.paid_call("a", dec!(999), at(2023, 3, 1), true);
        let service = service(fixture);

        let perf = service.allocation_performance("a", at(2025, 1, 1)).unwrap();
        assert_eq!(perf.moic, dec!(1.3));
        assert_eq!(perf.tvpi, dec!(1.3));
        assert_eq!(perf.dpi, dec!(0.1));
        assert_eq!(perf.rvpi, dec!(1.2));
        assert_eq!(perf.paid_in, dec!(300000));
        assert_eq!(perf.unfunded_commitment, dec!(200000));
        assert_eq!(perf.portfolio_weight, dec!(0.25));
        assert!(perf.irr_approx > Decimal::ZERO);
    }

    #[test]
    fn test_fund_aggregation() {
        let fixture = Fixture::default();
        fixture.allocation("a", dec!(600000), dec!(300000), dec!(400000), at(2022, 6, 1));
        fixture.allocation("b", dec!(400000), Decimal::ZERO, dec!(480000), at(2023, 6, 1));
        let service = service(fixture);

        let fund = service.fund_performance("fund-1", at(2025, 6, 1)).unwrap();
        assert_eq!(fund.total_allocated, dec!(1000000));
        assert_eq!(fund.tvpi, dec!(1.18));
        assert_eq!(fund.dpi, dec!(0.3));
        assert_eq!(fund.rvpi, dec!(0.88));
        assert_eq!(fund.allocations.len(), 2);
        assert_eq!(fund.age_years, (Decimal::from(1096) / dec!(365.25)).round_dp(4));

        assert!(matches!(
            service.fund_performance("fund-x", at(2025, 6, 1)),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn test_cash_flow_irr() {
        let fixture = Fixture::default();
        fixture.allocation("a", dec!(1000), Decimal::ZERO, dec!(1100), at(2024, 1, 1));
        fixture.paid_call("a", dec!(1000), at(2024, 1, 1), false);
        fixture.allocation("b", dec!(1000), Decimal::ZERO, Decimal::ZERO, at(2024, 1, 1));
        let service = service(fixture);

        let irr = service.cash_flow_irr("a", at(2025, 1, 1)).unwrap().unwrap();
        assert!((irr - dec!(0.0998)).abs() < dec!(0.0005), "got {}", irr);

        assert_eq!(service.cash_flow_irr("b", at(2025, 1, 1)).unwrap(), None);
    }
}
