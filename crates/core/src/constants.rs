use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Hour of day (UTC) every calendar date is pinned to.
pub const DEFAULT_NORMALIZATION_HOUR_UTC: u32 = 12;

/// Days between a call date and its due date.
pub const DEFAULT_DUE_DAYS: i64 = 10;

/// Reminder lead times before a due date, in days.
pub const DEFAULT_REMINDER_LEAD_DAYS: [i64; 3] = [7, 3, 1];

/// Days past the due date before a call counts as overdue.
pub const DEFAULT_GRACE_PERIOD_DAYS: i64 = 0;

/// Upper bound for any configured day offset (due, grace, reminder lead).
pub const MAX_SETTING_DAYS: i64 = 3650;

/// Decimal places of the currency minor unit.
pub const DEFAULT_CURRENCY_SCALE: u32 = 2;

/// Decimal precision for ratio calculations
pub const RATIO_DECIMAL_PRECISION: u32 = 6;

/// Floor applied to the holding period of the approximate IRR, in years.
pub const MIN_IRR_AGE_YEARS: Decimal = dec!(0.5);

/// Day-count basis used to turn day spans into years.
pub const DAYS_PER_YEAR: Decimal = dec!(365.25);
