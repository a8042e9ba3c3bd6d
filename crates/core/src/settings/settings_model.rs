//! Funding engine settings.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_CURRENCY_SCALE, DEFAULT_DUE_DAYS, DEFAULT_GRACE_PERIOD_DAYS,
    DEFAULT_NORMALIZATION_HOUR_UTC, DEFAULT_REMINDER_LEAD_DAYS, MAX_SETTING_DAYS,
};
use crate::errors::{Error, Result};

pub const ENV_NORMALIZATION_HOUR: &str = "DEALFLOW_NORMALIZATION_HOUR";
pub const ENV_DUE_DAYS: &str = "DEALFLOW_DUE_DAYS";
pub const ENV_REMINDER_LEAD_DAYS: &str = "DEALFLOW_REMINDER_LEAD_DAYS";
pub const ENV_GRACE_DAYS: &str = "DEALFLOW_GRACE_DAYS";
pub const ENV_PERCENTAGE_POLICY: &str = "DEALFLOW_PERCENTAGE_POLICY";
pub const ENV_CURRENCY_SCALE: &str = "DEALFLOW_CURRENCY_SCALE";

/// How the scheduler treats schedules whose calls add up to more than the commitment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PercentageTotalPolicy {
    /// Reject the schedule.
    Strict,
    /// Accept the schedule and report a warning.
    #[default]
    Warn,
    /// Accept the schedule silently.
    Off,
}

impl PercentageTotalPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            PercentageTotalPolicy::Strict => "strict",
            PercentageTotalPolicy::Warn => "warn",
            PercentageTotalPolicy::Off => "off",
        }
    }
}

impl fmt::Display for PercentageTotalPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PercentageTotalPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(PercentageTotalPolicy::Strict),
            "warn" => Ok(PercentageTotalPolicy::Warn),
            "off" => Ok(PercentageTotalPolicy::Off),
            other => Err(Error::InvalidConfigValue(format!(
                "unknown percentage policy '{}' (expected strict, warn or off)",
                other
            ))),
        }
    }
}

/// Settings shared by the date normalizer, the scheduler and the services.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FundingSettings {
    pub normalization_hour_utc: u32,
    pub due_days: i64,
    pub reminder_lead_days: Vec<i64>,
    pub grace_period_days: i64,
    pub percentage_policy: PercentageTotalPolicy,
    pub currency_scale: u32,
}

impl Default for FundingSettings {
    fn default() -> Self {
        Self {
            normalization_hour_utc: DEFAULT_NORMALIZATION_HOUR_UTC,
            due_days: DEFAULT_DUE_DAYS,
            reminder_lead_days: DEFAULT_REMINDER_LEAD_DAYS.to_vec(),
            grace_period_days: DEFAULT_GRACE_PERIOD_DAYS,
            percentage_policy: PercentageTotalPolicy::default(),
            currency_scale: DEFAULT_CURRENCY_SCALE,
        }
    }
}

impl FundingSettings {
    /// Loads settings from `DEALFLOW_*` environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads settings through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();

        if let Some(value) = lookup(ENV_NORMALIZATION_HOUR) {
            settings.normalization_hour_utc = parse_setting(ENV_NORMALIZATION_HOUR, &value)?;
        }
        if let Some(value) = lookup(ENV_DUE_DAYS) {
            settings.due_days = parse_setting(ENV_DUE_DAYS, &value)?;
        }
        if let Some(value) = lookup(ENV_REMINDER_LEAD_DAYS) {
            settings.reminder_lead_days = value
                .split(',')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(|part| parse_setting(ENV_REMINDER_LEAD_DAYS, part))
                .collect::<Result<Vec<i64>>>()?;
        }
        if let Some(value) = lookup(ENV_GRACE_DAYS) {
            settings.grace_period_days = parse_setting(ENV_GRACE_DAYS, &value)?;
        }
        if let Some(value) = lookup(ENV_PERCENTAGE_POLICY) {
            settings.percentage_policy = value.parse()?;
        }
        if let Some(value) = lookup(ENV_CURRENCY_SCALE) {
            settings.currency_scale = parse_setting(ENV_CURRENCY_SCALE, &value)?;
        }

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.normalization_hour_utc > 23 {
            return Err(Error::InvalidConfigValue(format!(
                "normalization hour must be between 0 and 23, got {}",
                self.normalization_hour_utc
            )));
        }
        if self.due_days < 1 {
            return Err(Error::InvalidConfigValue(format!(
                "due days must be at least 1 so that due dates fall after call dates, got {}",
                self.due_days
            )));
        }
        if self.due_days > MAX_SETTING_DAYS {
            return Err(Error::InvalidConfigValue(format!(
                "due days must be at most {}, got {}",
                MAX_SETTING_DAYS, self.due_days
            )));
        }
        if let Some(lead) = self
            .reminder_lead_days
            .iter()
            .find(|lead| !(0..=MAX_SETTING_DAYS).contains(*lead))
        {
            return Err(Error::InvalidConfigValue(format!(
                "reminder lead days must be between 0 and {}, got {}",
                MAX_SETTING_DAYS, lead
            )));
        }
        if !(0..=MAX_SETTING_DAYS).contains(&self.grace_period_days) {
            return Err(Error::InvalidConfigValue(format!(
                "grace period must be between 0 and {} days, got {}",
                MAX_SETTING_DAYS, self.grace_period_days
            )));
        }
        if self.currency_scale > 8 {
            return Err(Error::InvalidConfigValue(format!(
                "currency scale must be at most 8, got {}",
                self.currency_scale
            )));
        }
        Ok(())
    }
}

fn parse_setting<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse::<T>().map_err(|_| {
        Error::InvalidConfigValue(format!("{} has an invalid value '{}'", key, value))
    })
}
