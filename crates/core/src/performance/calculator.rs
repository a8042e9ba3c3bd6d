//! Investment performance ratios.
//!
//! All functions are pure. A zero denominator yields zero rather than an
//! error, so a brand-new commitment reports flat ratios.

use chrono::NaiveDate;
use rust_decimal::{Decimal, MathematicalOps};
use rust_decimal_macros::dec;

use crate::constants::{DAYS_PER_YEAR, MIN_IRR_AGE_YEARS, RATIO_DECIMAL_PRECISION};
use crate::errors::{CalculatorError, Result};

const CONVERGENCE_THRESHOLD: Decimal = dec!(0.0000001);
const MAX_IRR_ITERATIONS: u32 = 100;
const XIRR_DEFAULT_GUESS: Decimal = dec!(0.1);

pub struct PerformanceCalculator;

impl PerformanceCalculator {
    /// Multiple on invested capital against the commitment.
    pub fn moic(committed: Decimal, distributions: Decimal, market_value: Decimal) -> Decimal {
        ratio(distributions + market_value, committed)
    }

    pub fn tvpi(total_value: Decimal, total_allocated: Decimal) -> Decimal {
        ratio(total_value, total_allocated)
    }

    pub fn dpi(distributions: Decimal, total_allocated: Decimal) -> Decimal {
        ratio(distributions, total_allocated)
    }

    pub fn rvpi(residual_value: Decimal, total_allocated: Decimal) -> Decimal {
        ratio(residual_value, total_allocated)
    }

    /// Compounding-growth approximation of IRR: `(tv / ta)^(1 / age) - 1`.
    ///
    /// This is not a cash-flow-dated IRR; see [`PerformanceCalculator::xirr`]
    /// for that. `age_years` is floored at half a year.
    pub fn irr_approx(total_value: Decimal, total_allocated: Decimal, age_years: Decimal) -> Decimal {
        if total_allocated <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        let multiple = total_value / total_allocated;
        if multiple <= Decimal::ZERO {
            return dec!(-1);
        }
        let age = age_years.max(MIN_IRR_AGE_YEARS);
        match multiple.checked_powd(Decimal::ONE / age) {
            Some(growth) => (growth - Decimal::ONE).round_dp(RATIO_DECIMAL_PRECISION),
            None => Decimal::ZERO,
        }
    }

    pub fn portfolio_weight(allocation_amount: Decimal, total_fund_allocated: Decimal) -> Decimal {
        ratio(allocation_amount, total_fund_allocated)
    }

    /// Years between two dates on an ACT/365.25 basis; negative spans are zero.
    pub fn years_between(start: NaiveDate, end: NaiveDate) -> Decimal {
        let days = (end - start).num_days().max(0);
        Decimal::from(days) / DAYS_PER_YEAR
    }

    /// Cash-flow-dated internal rate of return.
    ///
    /// Newton-Raphson on the NPV of `dated_flows`, discounted from the earliest
    /// date. Outflows are negative. At least one outflow and one inflow are
    /// required.
    pub fn xirr(dated_flows: &[(NaiveDate, Decimal)]) -> Result<Decimal> {
        Self::xirr_with_guess(dated_flows, XIRR_DEFAULT_GUESS)
    }

    pub fn xirr_with_guess(dated_flows: &[(NaiveDate, Decimal)], guess: Decimal) -> Result<Decimal> {
        if dated_flows.len() < 2 {
            return Err(CalculatorError::InsufficientData(
                "XIRR requires at least 2 cash flows".to_string(),
            )
            .into());
        }
        let has_outflow = dated_flows.iter().any(|(_, amount)| *amount < Decimal::ZERO);
        let has_inflow = dated_flows.iter().any(|(_, amount)| *amount > Decimal::ZERO);
        if !has_outflow || !has_inflow {
            return Err(CalculatorError::InsufficientData(
                "XIRR requires both an outflow and an inflow".to_string(),
            )
            .into());
        }

        // checked above: dated_flows is non-empty
        let base_date = dated_flows
            .iter()
            .map(|(date, _)| *date)
            .min()
            .unwrap_or(dated_flows[0].0);
        let mut rate = guess;
        let mut last_npv = Decimal::ZERO;

        for i in 0..MAX_IRR_ITERATIONS {
            let mut npv = Decimal::ZERO;
            let mut dnpv = Decimal::ZERO;
            let one_plus_r = Decimal::ONE + rate;

            if one_plus_r <= Decimal::ZERO {
                return Err(convergence_failure(i, last_npv));
            }

            for (date, amount) in dated_flows {
                let years = Self::years_between(base_date, *date);
                let discount = one_plus_r.powd(years);
                if discount.is_zero() {
                    continue;
                }
                npv += amount / discount;
                dnpv -= years * amount / (one_plus_r * discount);
            }
            last_npv = npv;

            if npv.abs() < CONVERGENCE_THRESHOLD {
                return Ok(rate.round_dp(RATIO_DECIMAL_PRECISION));
            }
            if dnpv.is_zero() {
                return Err(convergence_failure(i, npv));
            }

            rate -= npv / dnpv;
            rate = rate.clamp(dec!(-0.99), dec!(100));
        }

        Err(convergence_failure(MAX_IRR_ITERATIONS, last_npv))
    }
}

fn ratio(numerator: Decimal, denominator: Decimal) -> Decimal {
    if denominator.is_zero() {
        return Decimal::ZERO;
    }
    (numerator / denominator).round_dp(RATIO_DECIMAL_PRECISION)
}

fn convergence_failure(iterations: u32, last_npv: Decimal) -> crate::errors::Error {
    CalculatorError::ConvergenceFailure {
        function: "XIRR",
        iterations,
        last_npv,
    }
    .into()
}
