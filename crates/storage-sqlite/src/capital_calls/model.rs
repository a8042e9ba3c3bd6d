//! Database models for capital calls and payments.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use dealflow_core::capital_calls::{
    CallSpec, CapitalCall, CapitalCallPayment, CapitalCallStatus, NewCapitalCallPayment,
};

use crate::errors::StorageError;
use crate::utils::{
    column_error, datetime_to_text, decimal_to_text, optional_text_to_datetime,
    optional_text_to_decimal, text_to_datetime, text_to_decimal,
};

/// Database model for capital calls
#[derive(
    Queryable,
    Identifiable,
    Insertable,
    AsChangeset,
    Selectable,
    PartialEq,
    Serialize,
    Deserialize,
    Debug,
    Clone,
)]
#[diesel(table_name = crate::schema::capital_calls)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[serde(rename_all = "camelCase")]
pub struct CapitalCallDB {
    pub id: String,
    pub allocation_id: String,
    pub call_amount: String,
    pub amount_type: String,
    pub source_percentage: Option<String>,
    pub call_date: String,
    pub due_date: String,
    pub status: String,
    pub paid_amount: String,
    pub notes: Option<String>,
    pub is_deleted: bool,
    pub deleted_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl CapitalCallDB {
    pub fn from_spec(
        id: String,
        allocation_id: &str,
        spec: CallSpec,
        status: CapitalCallStatus,
        now: DateTime<Utc>,
    ) -> Self {
        let now_text = datetime_to_text(&now);
        Self {
            id,
            allocation_id: allocation_id.to_string(),
            call_amount: decimal_to_text(&spec.call_amount),
            amount_type: spec.amount_type.as_str().to_string(),
            source_percentage: spec.source_percentage.as_ref().map(decimal_to_text),
            call_date: datetime_to_text(&spec.call_date),
            due_date: datetime_to_text(&spec.due_date),
            status: status.as_str().to_string(),
            paid_amount: "0".to_string(),
            notes: spec.notes,
            is_deleted: false,
            deleted_at: None,
            created_at: now_text.clone(),
            updated_at: now_text,
        }
    }
}

impl TryFrom<CapitalCallDB> for CapitalCall {
    type Error = StorageError;

    fn try_from(db: CapitalCallDB) -> Result<Self, Self::Error> {
        Ok(Self {
            call_amount: text_to_decimal(&db.call_amount, "call_amount")?,
            amount_type: db
                .amount_type
                .parse()
                .map_err(|e| column_error("capital_calls.amount_type", e))?,
            source_percentage: optional_text_to_decimal(
                db.source_percentage.as_deref(),
                "source_percentage",
            )?,
            call_date: text_to_datetime(&db.call_date, "call_date")?,
            due_date: text_to_datetime(&db.due_date, "due_date")?,
            status: db
                .status
                .parse()
                .map_err(|e| column_error("capital_calls.status", e))?,
            paid_amount: text_to_decimal(&db.paid_amount, "paid_amount")?,
            deleted_at: optional_text_to_datetime(db.deleted_at.as_deref(), "deleted_at")?,
            created_at: text_to_datetime(&db.created_at, "created_at")?,
            updated_at: text_to_datetime(&db.updated_at, "updated_at")?,
            id: db.id,
            allocation_id: db.allocation_id,
            notes: db.notes,
            is_deleted: db.is_deleted,
        })
    }
}

/// Database model for capital call payments. Rows are never updated.
#[derive(
    Queryable,
    Identifiable,
    Insertable,
    Selectable,
    PartialEq,
    Serialize,
    Deserialize,
    Debug,
    Clone,
)]
#[diesel(table_name = crate::schema::capital_call_payments)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[serde(rename_all = "camelCase")]
pub struct CapitalCallPaymentDB {
    pub id: String,
    pub capital_call_id: String,
    pub payment_amount: String,
    pub payment_date: String,
    pub payment_method: String,
    pub notes: Option<String>,
    pub idempotency_key: Option<String>,
    pub fingerprint: String,
    pub recorded_by: Option<String>,
    pub created_at: String,
}

impl CapitalCallPaymentDB {
    pub fn from_new(
        id: String,
        payment: NewCapitalCallPayment,
        fingerprint: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            capital_call_id: payment.capital_call_id,
            payment_amount: decimal_to_text(&payment.payment_amount),
            payment_date: datetime_to_text(&payment.payment_date),
            payment_method: payment.payment_method.as_str().to_string(),
            notes: payment.notes,
            idempotency_key: payment.idempotency_key,
            fingerprint,
            recorded_by: payment.recorded_by,
            created_at: datetime_to_text(&now),
        }
    }
}

impl TryFrom<CapitalCallPaymentDB> for CapitalCallPayment {
    type Error = StorageError;

    fn try_from(db: CapitalCallPaymentDB) -> Result<Self, Self::Error> {
        Ok(Self {
            payment_amount: text_to_decimal(&db.payment_amount, "payment_amount")?,
            payment_date: text_to_datetime(&db.payment_date, "payment_date")?,
            payment_method: db
                .payment_method
                .parse()
                .map_err(|e| column_error("capital_call_payments.payment_method", e))?,
            created_at: text_to_datetime(&db.created_at, "created_at")?,
            id: db.id,
            capital_call_id: db.capital_call_id,
            notes: db.notes,
            idempotency_key: db.idempotency_key,
            fingerprint: db.fingerprint,
            recorded_by: db.recorded_by,
        })
    }
}
