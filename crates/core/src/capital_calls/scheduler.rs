//! Expansion of a commitment into dated capital calls.

use chrono::{DateTime, Utc};
use log::warn;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::capital_calls_model::{CallAmount, CallSpec, NewCapitalCall};
use crate::constants::DEFAULT_CURRENCY_SCALE;
use crate::dates::DateNormalizer;
use crate::errors::{Result, ValidationError};
use crate::settings::{FundingSettings, PercentageTotalPolicy};

/// Upper bound on calls generated from one periodic schedule.
pub const MAX_SCHEDULE_CALLS: u32 = 240;

/// Schedule policy used to expand a commitment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleKind {
    Single,
    Monthly,
    Quarterly,
    Biannual,
    Annual,
    Custom,
}

impl ScheduleKind {
    /// Months between consecutive calls of a periodic schedule.
    pub fn period_months(&self) -> Option<u32> {
        match self {
            ScheduleKind::Monthly => Some(1),
            ScheduleKind::Quarterly => Some(3),
            ScheduleKind::Biannual => Some(6),
            ScheduleKind::Annual => Some(12),
            ScheduleKind::Single | ScheduleKind::Custom => None,
        }
    }
}

/// One entry of a custom schedule. Exactly one of `percentage` / `amount`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomCallEntry {
    pub date: Option<DateTime<Utc>>,
    pub percentage: Option<Decimal>,
    pub amount: Option<Decimal>,
}

/// Ephemeral description of a schedule; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleSpec {
    pub kind: ScheduleKind,
    pub first_call_date: Option<DateTime<Utc>>,
    pub call_count: Option<u32>,
    pub call_percentage: Option<Decimal>,
    pub call_amount: Option<Decimal>,
    #[serde(default)]
    pub custom_entries: Vec<CustomCallEntry>,
    /// Copied onto every generated call.
    pub notes: Option<String>,
}

impl ScheduleSpec {
    pub fn single(first_call_date: DateTime<Utc>) -> Self {
        Self {
            kind: ScheduleKind::Single,
            first_call_date: Some(first_call_date),
            call_count: None,
            call_percentage: None,
            call_amount: None,
            custom_entries: Vec::new(),
            notes: None,
        }
    }

    pub fn periodic(
        kind: ScheduleKind,
        first_call_date: DateTime<Utc>,
        call_count: u32,
        amount: CallAmount,
    ) -> Self {
        let (call_percentage, call_amount) = match amount {
            CallAmount::Percentage(p) => (Some(p), None),
            CallAmount::Dollar(a) => (None, Some(a)),
        };
        Self {
            kind,
            first_call_date: Some(first_call_date),
            call_count: Some(call_count),
            call_percentage,
            call_amount,
            custom_entries: Vec::new(),
            notes: None,
        }
    }

    pub fn custom(entries: Vec<CustomCallEntry>) -> Self {
        Self {
            kind: ScheduleKind::Custom,
            first_call_date: None,
            call_count: None,
            call_percentage: None,
            call_amount: None,
            custom_entries: entries,
            notes: None,
        }
    }
}

/// Output of a schedule expansion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleExpansion {
    pub calls: Vec<CallSpec>,
    pub commitment_amount: Decimal,
    /// Sum of calls that already existed for the allocation.
    pub existing_amount: Decimal,
    /// Sum of the calls in this expansion.
    pub scheduled_amount: Decimal,
    pub warnings: Vec<String>,
}

impl ScheduleExpansion {
    /// Share of the commitment covered by existing plus new calls, in percent.
    pub fn committed_percentage(&self) -> Decimal {
        if self.commitment_amount.is_zero() {
            return Decimal::ZERO;
        }
        ((self.existing_amount + self.scheduled_amount) / self.commitment_amount * dec!(100))
            .round_dp(2)
    }
}

/// Pure schedule generator. Performs no I/O.
#[derive(Debug, Clone)]
pub struct CapitalCallScheduler {
    normalizer: DateNormalizer,
    policy: PercentageTotalPolicy,
    currency_scale: u32,
}

impl Default for CapitalCallScheduler {
    fn default() -> Self {
        Self {
            normalizer: DateNormalizer::default(),
            policy: PercentageTotalPolicy::default(),
            currency_scale: DEFAULT_CURRENCY_SCALE,
        }
    }
}

impl CapitalCallScheduler {
    /// Fails with `InvalidConfigValue` when the settings do not validate.
    pub fn new(settings: &FundingSettings) -> Result<Self> {
        Ok(Self {
            normalizer: DateNormalizer::new(settings)?,
            policy: settings.percentage_policy,
            currency_scale: settings.currency_scale,
        })
    }

    pub fn normalizer(&self) -> &DateNormalizer {
        &self.normalizer
    }

    pub fn policy(&self) -> PercentageTotalPolicy {
        self.policy
    }

    /// Expands `spec` against a commitment.
    ///
    /// `existing_amount` is the total of calls already created for the
    /// allocation; it only feeds the cumulative-total check.
    pub fn expand(
        &self,
        commitment_amount: Decimal,
        existing_amount: Decimal,
        spec: &ScheduleSpec,
    ) -> Result<ScheduleExpansion> {
        validate_commitment(commitment_amount)?;

        let calls = match spec.kind {
            ScheduleKind::Single => {
                let first = require_first_date(spec)?;
                vec![self.build_call(
                    first,
                    None,
                    CallAmount::Percentage(dec!(100)),
                    commitment_amount,
                    spec.notes.clone(),
                )?]
            }
            ScheduleKind::Custom => self.expand_custom(commitment_amount, spec)?,
            periodic => {
                // period_months is Some for every remaining kind
                let period = periodic.period_months().unwrap_or(1);
                self.expand_periodic(commitment_amount, period, spec)?
            }
        };

        self.finish(commitment_amount, existing_amount, calls)
    }

    /// Resolves a single, individually entered call.
    pub fn expand_single_call(
        &self,
        commitment_amount: Decimal,
        existing_amount: Decimal,
        new_call: &NewCapitalCall,
    ) -> Result<ScheduleExpansion> {
        validate_commitment(commitment_amount)?;
        let call = self.build_call(
            new_call.call_date,
            new_call.due_date,
            new_call.call_amount,
            commitment_amount,
            new_call.notes.clone(),
        )?;
        self.finish(commitment_amount, existing_amount, vec![call])
    }

    /// Resolves a call magnitude to an absolute amount.
    ///
    /// Percentages are snapshotted against the commitment as it is now and
    /// rounded half-up to the currency minor unit.
    pub fn resolve_amount(
        &self,
        amount: CallAmount,
        commitment_amount: Decimal,
    ) -> Result<(Decimal, Option<Decimal>)> {
        match amount {
            CallAmount::Percentage(percentage) => {
                if percentage <= Decimal::ZERO || percentage > dec!(100) {
                    return Err(ValidationError::field(
                        "callPercentage",
                        format!("must be greater than 0 and at most 100, got {}", percentage),
                    )
                    .into());
                }
                let resolved = (percentage / dec!(100) * commitment_amount).round_dp_with_strategy(
                    self.currency_scale,
                    RoundingStrategy::MidpointAwayFromZero,
                );
                if resolved <= Decimal::ZERO {
                    return Err(ValidationError::field(
                        "callPercentage",
                        format!("{}% of {} rounds to zero", percentage, commitment_amount),
                    )
                    .into());
                }
                Ok((resolved, Some(percentage)))
            }
            CallAmount::Dollar(value) => {
                if value <= Decimal::ZERO {
                    return Err(ValidationError::field(
                        "callAmount",
                        format!("must be positive, got {}", value),
                    )
                    .into());
                }
                if value.normalize().scale() > self.currency_scale {
                    return Err(ValidationError::field(
                        "callAmount",
                        format!(
                            "{} has more than {} decimal places",
                            value, self.currency_scale
                        ),
                    )
                    .into());
                }
                Ok((value, None))
            }
        }
    }

    fn expand_periodic(
        &self,
        commitment_amount: Decimal,
        period_months: u32,
        spec: &ScheduleSpec,
    ) -> Result<Vec<CallSpec>> {
        let first = require_first_date(spec)?;
        let count = spec
            .call_count
            .ok_or_else(|| ValidationError::MissingField("callCount".to_string()))?;
        if count == 0 || count > MAX_SCHEDULE_CALLS {
            return Err(ValidationError::field(
                "callCount",
                format!("must be between 1 and {}, got {}", MAX_SCHEDULE_CALLS, count),
            )
            .into());
        }
        let amount = match (spec.call_percentage, spec.call_amount) {
            (Some(percentage), None) => CallAmount::Percentage(percentage),
            (None, Some(value)) => CallAmount::Dollar(value),
            (None, None) => {
                return Err(ValidationError::MissingField("callPercentage".to_string()).into())
            }
            (Some(_), Some(_)) => {
                return Err(ValidationError::field(
                    "callAmount",
                    "provide either callPercentage or callAmount, not both",
                )
                .into())
            }
        };

        (0..count)
            .map(|i| {
                // Always offset from the anchor so month-end dates do not drift.
                let call_date = self.normalizer.add_months(first, i * period_months)?;
                self.build_call(call_date, None, amount, commitment_amount, spec.notes.clone())
            })
            .collect()
    }

    fn expand_custom(&self, commitment_amount: Decimal, spec: &ScheduleSpec) -> Result<Vec<CallSpec>> {
        if spec.custom_entries.is_empty() {
            return Err(ValidationError::MissingField("customEntries".to_string()).into());
        }

        let mut calls = spec
            .custom_entries
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                let date = entry.date.ok_or_else(|| {
                    ValidationError::MissingField(format!("customEntries[{}].date", index))
                })?;
                let amount = match (entry.percentage, entry.amount) {
                    (Some(percentage), None) => CallAmount::Percentage(percentage),
                    (None, Some(value)) => CallAmount::Dollar(value),
                    _ => {
                        return Err(ValidationError::field(
                            format!("customEntries[{}]", index),
                            "exactly one of percentage or amount is required",
                        )
                        .into())
                    }
                };
                self.build_call(date, None, amount, commitment_amount, spec.notes.clone())
            })
            .collect::<Result<Vec<CallSpec>>>()?;

        calls.sort_by_key(|call| call.call_date);
        if let Some(pair) = calls.windows(2).find(|pair| pair[0].call_date == pair[1].call_date) {
            return Err(ValidationError::field(
                "customEntries",
                format!(
                    "more than one call on {}",
                    pair[0].call_date.date_naive()
                ),
            )
            .into());
        }
        Ok(calls)
    }

    fn build_call(
        &self,
        call_date: DateTime<Utc>,
        due_date: Option<DateTime<Utc>>,
        amount: CallAmount,
        commitment_amount: Decimal,
        notes: Option<String>,
    ) -> Result<CallSpec> {
        let call_date = self.normalizer.normalize(call_date);
        let due_date = match due_date {
            Some(explicit) => {
                let explicit = self.normalizer.normalize(explicit);
                if explicit <= call_date {
                    return Err(ValidationError::field(
                        "dueDate",
                        format!(
                            "must fall after the call date {}",
                            call_date.date_naive()
                        ),
                    )
                    .into());
                }
                explicit
            }
            None => self.normalizer.due_date_from(call_date),
        };
        let (call_amount, source_percentage) = self.resolve_amount(amount, commitment_amount)?;

        Ok(CallSpec {
            call_date,
            due_date,
            call_amount,
            amount_type: amount.amount_type(),
            source_percentage,
            notes,
        })
    }

    fn finish(
        &self,
        commitment_amount: Decimal,
        existing_amount: Decimal,
        calls: Vec<CallSpec>,
    ) -> Result<ScheduleExpansion> {
        let scheduled_amount: Decimal = calls.iter().map(|call| call.call_amount).sum();
        let mut expansion = ScheduleExpansion {
            calls,
            commitment_amount,
            existing_amount,
            scheduled_amount,
            warnings: Vec::new(),
        };

        if existing_amount + scheduled_amount > commitment_amount {
            let message = format!(
                "Capital calls total {} ({}% of the commitment), exceeding the commitment of {}",
                existing_amount + scheduled_amount,
                expansion.committed_percentage(),
                commitment_amount
            );
            match self.policy {
                PercentageTotalPolicy::Strict => {
                    return Err(ValidationError::field("schedule", message).into());
                }
                PercentageTotalPolicy::Warn => {
                    warn!("{}", message);
                    expansion.warnings.push(message);
                }
                PercentageTotalPolicy::Off => {}
            }
        }

        Ok(expansion)
    }
}

fn validate_commitment(commitment_amount: Decimal) -> Result<()> {
    if commitment_amount <= Decimal::ZERO {
        return Err(ValidationError::field(
            "committedAmount",
            format!("must be positive, got {}", commitment_amount),
        )
        .into());
    }
    Ok(())
}

fn require_first_date(spec: &ScheduleSpec) -> Result<DateTime<Utc>> {
    spec.first_call_date
        .ok_or_else(|| ValidationError::MissingField("firstCallDate".to_string()).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capital_calls::AmountType;
    use crate::errors::Error;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        DateNormalizer::default().from_date(NaiveDate::from_ymd_opt(y, m, d).unwrap())
    }

    fn scheduler_with(policy: PercentageTotalPolicy) -> CapitalCallScheduler {
        CapitalCallScheduler::new(&FundingSettings {
            percentage_policy: policy,
            ..FundingSettings::default()
        })
        .unwrap()
    }

    #[test]
    fn test_rejects_settings_that_would_break_due_dates() {
        let same_day_due = FundingSettings {
            due_days: 0,
            ..FundingSettings::default()
        };
        assert!(matches!(
            CapitalCallScheduler::new(&same_day_due),
            Err(Error::InvalidConfigValue(_))
        ));

        let bad_hour = FundingSettings {
            normalization_hour_utc: 25,
            ..FundingSettings::default()
        };
        assert!(matches!(
            CapitalCallScheduler::new(&bad_hour),
            Err(Error::InvalidConfigValue(_))
        ));
    }

    #[test]
    fn test_shortest_due_period_still_falls_after_call_date() {
        let scheduler = CapitalCallScheduler::new(&FundingSettings {
            due_days: 1,
            ..FundingSettings::default()
        })
        .unwrap();
        let spec = ScheduleSpec::periodic(
            ScheduleKind::Quarterly,
            date(2025, 1, 15),
            4,
            CallAmount::Percentage(dec!(25)),
        );

        let expansion = scheduler.expand(dec!(1000), Decimal::ZERO, &spec).unwrap();
        assert_eq!(expansion.calls.len(), 4);
        assert!(expansion.calls.iter().all(|c| c.due_date > c.call_date));
    }

    #[test]
    fn test_quarterly_schedule() {
        let scheduler = CapitalCallScheduler::default();
        let spec = ScheduleSpec::periodic(
            ScheduleKind::Quarterly,
            date(2025, 1, 15),
            4,
            CallAmount::Percentage(dec!(25)),
        );

        let expansion = scheduler.expand(dec!(1000000), Decimal::ZERO, &spec).unwrap();

        let dates: Vec<_> = expansion.calls.iter().map(|c| c.call_date).collect();
        assert_eq!(
            dates,
            vec![
                date(2025, 1, 15),
                date(2025, 4, 15),
                date(2025, 7, 15),
                date(2025, 10, 15)
            ]
        );
        for call in &expansion.calls {
            assert_eq!(call.call_amount, dec!(250000));
            assert_eq!(call.amount_type, AmountType::Percentage);
            assert_eq!(call.source_percentage, Some(dec!(25)));
            assert_eq!(call.due_date, scheduler.normalizer().due_date_from(call.call_date));
            assert!(call.due_date > call.call_date);
        }
        assert_eq!(expansion.scheduled_amount, dec!(1000000));
        assert!(expansion.warnings.is_empty());
    }

    #[test]
    fn test_periods_by_kind() {
        let scheduler = CapitalCallScheduler::default();
        let cases = [
            (ScheduleKind::Monthly, date(2025, 2, 15)),
            (ScheduleKind::Biannual, date(2025, 7, 15)),
            (ScheduleKind::Annual, date(2026, 1, 15)),
        ];
        for (kind, second) in cases {
            let spec = ScheduleSpec::periodic(kind, date(2025, 1, 15), 2, CallAmount::Dollar(dec!(1000)));
            let expansion = scheduler.expand(dec!(10000), Decimal::ZERO, &spec).unwrap();
            assert_eq!(expansion.calls[1].call_date, second, "{:?}", kind);
            assert_eq!(expansion.calls[1].amount_type, AmountType::Dollar);
            assert_eq!(expansion.calls[1].source_percentage, None);
        }
    }

    #[test]
    fn test_single_schedule_calls_everything() {
        let scheduler = CapitalCallScheduler::default();
        let expansion = scheduler
            .expand(dec!(750000.50), Decimal::ZERO, &ScheduleSpec::single(date(2025, 3, 1)))
            .unwrap();
        assert_eq!(expansion.calls.len(), 1);
        assert_eq!(expansion.calls[0].call_amount, dec!(750000.50));
        assert_eq!(expansion.calls[0].source_percentage, Some(dec!(100)));
    }

    #[test]
    fn test_month_end_anchor_does_not_drift() {
        let scheduler = CapitalCallScheduler::default();
        let spec = ScheduleSpec::periodic(
            ScheduleKind::Monthly,
            date(2025, 1, 31),
            3,
            CallAmount::Percentage(dec!(10)),
        );
        let expansion = scheduler.expand(dec!(1000), Decimal::ZERO, &spec).unwrap();
        let dates: Vec<_> = expansion.calls.iter().map(|c| c.call_date).collect();
        assert_eq!(dates, vec![date(2025, 1, 31), date(2025, 2, 28), date(2025, 3, 31)]);
    }

    #[test]
    fn test_percentage_rounds_half_up() {
        let scheduler = CapitalCallScheduler::default();
        // 33.335% of 100 = 33.335 -> 33.34
        let (amount, source) = scheduler
            .resolve_amount(CallAmount::Percentage(dec!(33.335)), dec!(100))
            .unwrap();
        assert_eq!(amount, dec!(33.34));
        assert_eq!(source, Some(dec!(33.335)));

        let (amount, _) = scheduler
            .resolve_amount(CallAmount::Percentage(dec!(33.3333)), dec!(1000000))
            .unwrap();
        assert_eq!(amount, dec!(333333.00));
    }

    #[test]
    fn test_custom_schedule_sorted_and_resolved() {
        let scheduler = CapitalCallScheduler::default();
        let spec = ScheduleSpec::custom(vec![
            CustomCallEntry {
                date: Some(date(2025, 9, 1)),
                percentage: None,
                amount: Some(dec!(100000)),
            },
            CustomCallEntry {
                date: Some(date(2025, 2, 1)),
                percentage: Some(dec!(40)),
                amount: None,
            },
        ]);
        let expansion = scheduler.expand(dec!(500000), Decimal::ZERO, &spec).unwrap();
        assert_eq!(expansion.calls[0].call_date, date(2025, 2, 1));
        assert_eq!(expansion.calls[0].call_amount, dec!(200000));
        assert_eq!(expansion.calls[1].call_amount, dec!(100000));
        assert_eq!(expansion.scheduled_amount, dec!(300000));
        assert_eq!(expansion.committed_percentage(), dec!(60));
    }

    #[test]
    fn test_custom_entries_are_validated() {
        let scheduler = CapitalCallScheduler::default();
        let missing_date = ScheduleSpec::custom(vec![CustomCallEntry {
            date: None,
            percentage: Some(dec!(10)),
            amount: None,
        }]);
        assert!(matches!(
            scheduler.expand(dec!(1000), Decimal::ZERO, &missing_date),
            Err(Error::Validation(ValidationError::MissingField(_)))
        ));

        let zero_amount = ScheduleSpec::custom(vec![CustomCallEntry {
            date: Some(date(2025, 1, 1)),
            percentage: None,
            amount: Some(Decimal::ZERO),
        }]);
        assert!(scheduler.expand(dec!(1000), Decimal::ZERO, &zero_amount).is_err());

        let duplicate = ScheduleSpec::custom(vec![
            CustomCallEntry {
                date: Some(date(2025, 1, 1)),
                percentage: Some(dec!(10)),
                amount: None,
            },
            CustomCallEntry {
                date: Some(date(2025, 1, 1)),
                percentage: Some(dec!(20)),
                amount: None,
            },
        ]);
        assert!(scheduler.expand(dec!(1000), Decimal::ZERO, &duplicate).is_err());

        assert!(scheduler
            .expand(dec!(1000), Decimal::ZERO, &ScheduleSpec::custom(Vec::new()))
            .is_err());
    }

    #[test]
    fn test_periodic_requires_count_and_single_magnitude() {
        let scheduler = CapitalCallScheduler::default();
        let mut spec = ScheduleSpec::periodic(
            ScheduleKind::Quarterly,
            date(2025, 1, 15),
            0,
            CallAmount::Percentage(dec!(25)),
        );
        assert!(scheduler.expand(dec!(1000), Decimal::ZERO, &spec).is_err());

        spec.call_count = Some(2);
        spec.call_amount = Some(dec!(10));
        assert!(scheduler.expand(dec!(1000), Decimal::ZERO, &spec).is_err());

        spec.call_percentage = Some(dec!(150));
        spec.call_amount = None;
        assert!(scheduler.expand(dec!(1000), Decimal::ZERO, &spec).is_err());
    }

    #[test]
    fn test_over_commitment_policies() {
        let spec = ScheduleSpec::periodic(
            ScheduleKind::Annual,
            date(2025, 1, 15),
            3,
            CallAmount::Percentage(dec!(50)),
        );

        let strict = scheduler_with(PercentageTotalPolicy::Strict);
        assert!(matches!(
            strict.expand(dec!(1000), Decimal::ZERO, &spec),
            Err(Error::Validation(ValidationError::InvalidField { .. }))
        ));

        let warn = scheduler_with(PercentageTotalPolicy::Warn);
        let expansion = warn.expand(dec!(1000), Decimal::ZERO, &spec).unwrap();
        assert_eq!(expansion.calls.len(), 3);
        assert_eq!(expansion.warnings.len(), 1);
        assert_eq!(expansion.committed_percentage(), dec!(150));

        let off = scheduler_with(PercentageTotalPolicy::Off);
        let expansion = off.expand(dec!(1000), Decimal::ZERO, &spec).unwrap();
        assert!(expansion.warnings.is_empty());
    }

    #[test]
    fn test_existing_calls_count_toward_total() {
        let strict = scheduler_with(PercentageTotalPolicy::Strict);
        let spec = ScheduleSpec::single(date(2025, 1, 15));
        assert!(strict.expand(dec!(1000), dec!(1), &spec).is_err());
        assert!(strict.expand(dec!(1000), Decimal::ZERO, &spec).is_ok());
    }

    #[test]
    fn test_single_call_with_explicit_due_date() {
        let scheduler = CapitalCallScheduler::default();
        let mut new_call = NewCapitalCall {
            allocation_id: "alloc-1".to_string(),
            call_amount: CallAmount::Dollar(dec!(5000)),
            call_date: date(2025, 5, 1),
            due_date: Some(date(2025, 5, 31)),
            status: None,
            notes: Some("initial close".to_string()),
        };
        let expansion = scheduler
            .expand_single_call(dec!(10000), Decimal::ZERO, &new_call)
            .unwrap();
        assert_eq!(expansion.calls[0].due_date, date(2025, 5, 31));
        assert_eq!(expansion.calls[0].notes.as_deref(), Some("initial close"));

        new_call.due_date = Some(date(2025, 5, 1));
        assert!(scheduler
            .expand_single_call(dec!(10000), Decimal::ZERO, &new_call)
            .is_err());
    }

    #[test]
    fn test_dollar_amount_precision() {
        let scheduler = CapitalCallScheduler::default();
        assert!(scheduler
            .resolve_amount(CallAmount::Dollar(dec!(10.005)), dec!(100))
            .is_err());
        assert!(scheduler
            .resolve_amount(CallAmount::Dollar(dec!(10.500)), dec!(100))
            .is_ok());
    }
}
