//! Database models for allocations.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use dealflow_core::allocations::{Allocation, AllocationStatus, NewAllocation};

use crate::errors::StorageError;
use crate::utils::{column_error, datetime_to_text, decimal_to_text, text_to_datetime, text_to_decimal};

/// Database model for allocations
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
#[diesel(table_name = crate::schema::allocations)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[serde(rename_all = "camelCase")]
pub struct AllocationDB {
    pub id: String,
    pub fund_id: String,
    pub deal_id: String,
    pub committed_amount: String,
    pub commitment_date: String,
    pub status: String,
    pub distributions_paid: String,
    pub market_value: String,
    pub created_at: String,
    pub updated_at: String,
}

impl AllocationDB {
    pub fn from_new(new_allocation: NewAllocation, id: String, now: DateTime<Utc>) -> Self {
        let now_text = datetime_to_text(&now);
        Self {
            id,
            fund_id: new_allocation.fund_id,
            deal_id: new_allocation.deal_id,
            committed_amount: decimal_to_text(&new_allocation.committed_amount),
            commitment_date: datetime_to_text(&new_allocation.commitment_date),
            status: AllocationStatus::Committed.as_str().to_string(),
            distributions_paid: decimal_to_text(&new_allocation.distributions_paid),
            market_value: decimal_to_text(&new_allocation.market_value),
            created_at: now_text.clone(),
            updated_at: now_text,
        }
    }
}

impl TryFrom<AllocationDB> for Allocation {
    type Error = StorageError;

    fn try_from(db: AllocationDB) -> Result<Self, Self::Error> {
        Ok(Self {
            committed_amount: text_to_decimal(&db.committed_amount, "committed_amount")?,
            commitment_date: text_to_datetime(&db.commitment_date, "commitment_date")?,
            status: db
                .status
                .parse()
                .map_err(|e| column_error("allocations.status", e))?,
            distributions_paid: text_to_decimal(&db.distributions_paid, "distributions_paid")?,
            market_value: text_to_decimal(&db.market_value, "market_value")?,
            created_at: text_to_datetime(&db.created_at, "created_at")?,
            updated_at: text_to_datetime(&db.updated_at, "updated_at")?,
            id: db.id,
            fund_id: db.fund_id,
            deal_id: db.deal_id,
        })
    }
}
