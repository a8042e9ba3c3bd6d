//! Column encoding helpers.
//!
//! Decimals and timestamps are stored as TEXT. Timestamps always use the same
//! RFC 3339 shape (UTC, microseconds, `Z` suffix) so lexical order equals
//! chronological order and range filters can run in SQL.

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;

use crate::errors::StorageError;

pub fn datetime_to_text(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn text_to_datetime(value: &str, column: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            log::error!("Failed to parse {} '{}': {}", column, value, e);
            StorageError::SerializationError(format!("{} '{}': {}", column, value, e))
        })
}

pub fn decimal_to_text(value: &Decimal) -> String {
    value.normalize().to_string()
}

pub fn text_to_decimal(value: &str, column: &str) -> Result<Decimal, StorageError> {
    Decimal::from_str(value).map_err(|e| {
        log::error!("Failed to parse {} '{}': {}", column, value, e);
        StorageError::SerializationError(format!("{} '{}': {}", column, value, e))
    })
}

pub fn optional_text_to_decimal(
    value: Option<&str>,
    column: &str,
) -> Result<Option<Decimal>, StorageError> {
    value.map(|v| text_to_decimal(v, column)).transpose()
}

pub fn optional_text_to_datetime(
    value: Option<&str>,
    column: &str,
) -> Result<Option<DateTime<Utc>>, StorageError> {
    value.map(|v| text_to_datetime(v, column)).transpose()
}

/// Maps an unparseable enum column onto a storage error.
pub fn column_error(column: &str, err: dealflow_core::Error) -> StorageError {
    log::error!("Invalid value in column {}: {}", column, err);
    StorageError::SerializationError(format!("{}: {}", column, err))
}
