use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc, Weekday};

use crate::constants::{
    DEFAULT_DUE_DAYS, DEFAULT_GRACE_PERIOD_DAYS, DEFAULT_NORMALIZATION_HOUR_UTC,
    DEFAULT_REMINDER_LEAD_DAYS,
};
use crate::errors::{Error, Result, ValidationError};
use crate::settings::FundingSettings;

/// Pins calendar dates to a single UTC time of day.
///
/// Every date that enters or leaves the funding engine goes through this type.
/// Storing noon UTC (by default) instead of midnight means a round-trip through
/// any local timezone between UTC-11 and UTC+11 still lands on the same
/// calendar day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateNormalizer {
    time_of_day: NaiveTime,
    due_days: i64,
    reminder_lead_days: Vec<i64>,
    grace_period_days: i64,
}

impl Default for DateNormalizer {
    fn default() -> Self {
        Self {
            time_of_day: NaiveTime::MIN + Duration::hours(i64::from(DEFAULT_NORMALIZATION_HOUR_UTC)),
            due_days: DEFAULT_DUE_DAYS,
            reminder_lead_days: sorted_leads(&DEFAULT_REMINDER_LEAD_DAYS),
            grace_period_days: DEFAULT_GRACE_PERIOD_DAYS,
        }
    }
}

/// Largest lead first, so reminders come out in chronological order.
fn sorted_leads(leads: &[i64]) -> Vec<i64> {
    let mut leads = leads.to_vec();
    leads.sort_unstable_by(|a, b| b.cmp(a));
    leads.dedup();
    leads
}

impl DateNormalizer {
    /// Fails with `InvalidConfigValue` when the settings do not validate.
    pub fn new(settings: &FundingSettings) -> Result<Self> {
        settings.validate()?;
        let time_of_day = NaiveTime::from_hms_opt(settings.normalization_hour_utc, 0, 0)
            .ok_or_else(|| {
                Error::InvalidConfigValue(format!(
                    "normalization hour {} is not a valid time of day",
                    settings.normalization_hour_utc
                ))
            })?;

        Ok(Self {
            time_of_day,
            due_days: settings.due_days,
            reminder_lead_days: sorted_leads(&settings.reminder_lead_days),
            grace_period_days: settings.grace_period_days,
        })
    }

    pub fn time_of_day(&self) -> NaiveTime {
        self.time_of_day
    }

    /// Builds the canonical instant for a calendar date.
    pub fn from_date(&self, date: NaiveDate) -> DateTime<Utc> {
        Utc.from_utc_datetime(&date.and_time(self.time_of_day))
    }

    /// Moves an instant to the configured time of day on its UTC calendar date.
    pub fn normalize(&self, instant: DateTime<Utc>) -> DateTime<Utc> {
        self.from_date(instant.date_naive())
    }

    pub fn is_normalized(&self, instant: &DateTime<Utc>) -> bool {
        instant.time() == self.time_of_day
    }

    /// Parses `YYYY-MM-DD`, RFC 3339 or a naive `YYYY-MM-DDTHH:MM:SS` timestamp.
    ///
    /// RFC 3339 inputs keep the calendar date of their own offset: a client in
    /// New York sending `2025-01-15T21:00:00-05:00` means January 15th even
    /// though the instant is already the 16th in UTC.
    pub fn parse(&self, input: &str) -> Result<DateTime<Utc>> {
        let value = input.trim();
        if value.is_empty() {
            return Err(ValidationError::InvalidDate("date is empty".to_string()).into());
        }

        if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
            return Ok(self.from_date(date));
        }
        if let Ok(with_offset) = DateTime::parse_from_rfc3339(value) {
            return Ok(self.from_date(with_offset.date_naive()));
        }
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S") {
            return Ok(self.from_date(naive.date()));
        }

        Err(ValidationError::InvalidDate(format!(
            "'{}' is not a valid date (expected YYYY-MM-DD or RFC 3339)",
            value
        ))
        .into())
    }

    pub fn add_days(&self, date: DateTime<Utc>, days: i64) -> DateTime<Utc> {
        self.normalize(date + Duration::days(days))
    }

    /// Adds calendar months, clamping to the last day of shorter months.
    ///
    /// Callers building a series should always add to the same anchor date
    /// (`anchor + i months`) rather than chaining, otherwise a Jan 31 anchor
    /// decays to the 28th after February.
    pub fn add_months(&self, date: DateTime<Utc>, months: u32) -> Result<DateTime<Utc>> {
        date.date_naive()
            .checked_add_months(Months::new(months))
            .map(|shifted| self.from_date(shifted))
            .ok_or_else(|| {
                ValidationError::InvalidDate(format!(
                    "{} plus {} months is out of range",
                    date.date_naive(),
                    months
                ))
                .into()
            })
    }

    pub fn due_date_from(&self, call_date: DateTime<Utc>) -> DateTime<Utc> {
        self.add_days(call_date, self.due_days)
    }

    /// Reminder dates for a due date, earliest first.
    pub fn reminder_dates(&self, due_date: DateTime<Utc>) -> Vec<DateTime<Utc>> {
        self.reminder_lead_days
            .iter()
            .map(|lead| self.add_days(due_date, -lead))
            .collect()
    }

    /// A call is overdue strictly after `due_date + grace period`.
    pub fn is_overdue(&self, due_date: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now > self.normalize(due_date) + Duration::days(self.grace_period_days)
    }

    /// Weekdays in `[start, end)`; zero when `start >= end`.
    pub fn business_days_between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
        let start = start.date_naive();
        let end = end.date_naive();
        if start >= end {
            return 0;
        }

        let total_days = (end - start).num_days();
        let full_weeks = total_days / 7;
        let mut count = full_weeks * 5;
        let mut day = start + Duration::days(full_weeks * 7);
        while day < end {
            if !is_weekend(day) {
                count += 1;
            }
            day += Duration::days(1);
        }
        count
    }

    /// Rolls weekend dates forward to Monday; weekdays are returned unchanged.
    pub fn next_business_day(&self, date: DateTime<Utc>) -> DateTime<Utc> {
        match date.date_naive().weekday() {
            Weekday::Sat => self.add_days(date, 2),
            Weekday::Sun => self.add_days(date, 1),
            _ => self.normalize(date),
        }
    }
}

fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn normalizer() -> DateNormalizer {
        DateNormalizer::default()
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_normalize_pins_noon_utc() {
        let n = normalizer();
        let late = Utc.with_ymd_and_hms(2025, 1, 15, 23, 59, 59).unwrap();
        let normalized = n.normalize(late);
        assert_eq!(normalized, Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap());
        assert_eq!(normalized.hour(), 12);
        assert!(n.is_normalized(&normalized));
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let n = normalizer();
        let d = Utc.with_ymd_and_hms(2024, 2, 29, 3, 17, 0).unwrap();
        assert_eq!(n.normalize(n.normalize(d)), n.normalize(d));
    }

    #[test]
    fn test_parse_keeps_the_callers_calendar_day() {
        let n = normalizer();
        let parsed = n.parse("2025-01-15T21:00:00-05:00").unwrap();
        assert_eq!(parsed.date_naive(), ymd(2025, 1, 15));
        assert_eq!(n.parse("2025-01-15").unwrap(), parsed);
        assert_eq!(n.parse("2025-01-15T08:30:00").unwrap(), parsed);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let n = normalizer();
        assert!(n.parse("").is_err());
        assert!(n.parse("15/01/2025").is_err());
        assert!(n.parse("2025-02-30").is_err());
    }

    #[test]
    fn test_due_date_and_reminders() {
        let n = normalizer();
        let call = n.from_date(ymd(2025, 1, 15));
        let due = n.due_date_from(call);
        assert_eq!(due, n.from_date(ymd(2025, 1, 25)));
        assert!(due > call);

        let reminders = n.reminder_dates(due);
        assert_eq!(
            reminders,
            vec![
                n.from_date(ymd(2025, 1, 18)),
                n.from_date(ymd(2025, 1, 22)),
                n.from_date(ymd(2025, 1, 24)),
            ]
        );
        assert!(reminders.iter().all(|r| n.is_normalized(r)));
    }

    #[test]
    fn test_overdue_boundary_respects_grace_period() {
        let settings = FundingSettings {
            grace_period_days: 3,
            ..FundingSettings::default()
        };
        let n = DateNormalizer::new(&settings).unwrap();
        let due = n.from_date(ymd(2025, 3, 1));
        let limit = due + Duration::days(3);

        assert!(!n.is_overdue(due, due));
        assert!(!n.is_overdue(due, limit));
        assert!(n.is_overdue(due, limit + Duration::seconds(1)));
    }

    #[test]
    fn test_business_days_between() {
        let n = normalizer();
        // Wed 2025-01-15 .. Wed 2025-01-22: Wed, Thu, Fri, Mon, Tue
        let start = n.from_date(ymd(2025, 1, 15));
        let end = n.from_date(ymd(2025, 1, 22));
        assert_eq!(n.business_days_between(start, end), 5);
        assert_eq!(n.business_days_between(end, start), 0);
        assert_eq!(n.business_days_between(start, start), 0);

        let sat = n.from_date(ymd(2025, 1, 18));
        let mon = n.from_date(ymd(2025, 1, 20));
        assert_eq!(n.business_days_between(sat, mon), 0);

        let far = n.from_date(ymd(2025, 3, 17));
        assert_eq!(n.business_days_between(start, far), 43);
    }

    #[test]
    fn test_next_business_day_rolls_weekends() {
        let n = normalizer();
        let monday = n.from_date(ymd(2025, 1, 20));
        assert_eq!(n.next_business_day(n.from_date(ymd(2025, 1, 18))), monday);
        assert_eq!(n.next_business_day(n.from_date(ymd(2025, 1, 19))), monday);
        assert_eq!(n.next_business_day(monday), monday);
    }

    #[test]
    fn test_add_months_clamps_month_end() {
        let n = normalizer();
        let jan31 = n.from_date(ymd(2024, 1, 31));
        assert_eq!(n.add_months(jan31, 1).unwrap(), n.from_date(ymd(2024, 2, 29)));
        assert_eq!(n.add_months(jan31, 2).unwrap(), n.from_date(ymd(2024, 3, 31)));
    }

    #[test]
    fn test_custom_hour() {
        let settings = FundingSettings {
            normalization_hour_utc: 6,
            ..FundingSettings::default()
        };
        let n = DateNormalizer::new(&settings).unwrap();
        let d = n.parse("2025-06-30").unwrap();
        assert_eq!(d.hour(), 6);
        assert_eq!(n.due_date_from(d).hour(), 6);
    }

    #[test]
    fn test_default_matches_default_settings() {
        assert_eq!(
            DateNormalizer::default(),
            DateNormalizer::new(&FundingSettings::default()).unwrap()
        );
    }

    #[test]
    fn test_invalid_settings_are_rejected() {
        let out_of_range_hour = FundingSettings {
            normalization_hour_utc: 25,
            ..FundingSettings::default()
        };
        assert!(matches!(
            DateNormalizer::new(&out_of_range_hour),
            Err(Error::InvalidConfigValue(_))
        ));

        let same_day_due = FundingSettings {
            due_days: 0,
            ..FundingSettings::default()
        };
        assert!(matches!(
            DateNormalizer::new(&same_day_due),
            Err(Error::InvalidConfigValue(_))
        ));

        let unbounded_grace = FundingSettings {
            grace_period_days: i64::MAX,
            ..FundingSettings::default()
        };
        assert!(matches!(
            DateNormalizer::new(&unbounded_grace),
            Err(Error::InvalidConfigValue(_))
        ));
    }
}
