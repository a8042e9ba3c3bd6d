use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel::SqliteConnection;
use log::debug;
use std::sync::Arc;
use uuid::Uuid;

use dealflow_core::allocations::{
    Allocation, AllocationPerformanceUpdate, AllocationRepositoryTrait, AllocationStatus,
    NewAllocation,
};
use dealflow_core::errors::{Error, ValidationError};
use dealflow_core::Result;

use super::model::AllocationDB;
use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::{IntoCore, StorageError};
use crate::schema::{allocations, capital_calls};
use crate::utils::{datetime_to_text, decimal_to_text};

pub struct AllocationRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl AllocationRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        AllocationRepository { pool, writer }
    }
}

/// Loads one allocation on the given connection.
pub(crate) fn find_allocation(conn: &mut SqliteConnection, allocation_id: &str) -> Result<Allocation> {
    let row = allocations::table
        .find(allocation_id)
        .select(AllocationDB::as_select())
        .first::<AllocationDB>(conn)
        .optional()
        .into_core()?
        .ok_or_else(|| Error::not_found("allocation", allocation_id))?;
    Ok(Allocation::try_from(row)?)
}

fn to_allocations(rows: Vec<AllocationDB>) -> Result<Vec<Allocation>> {
    rows.into_iter()
        .map(|row| Allocation::try_from(row).map_err(Error::from))
        .collect()
}

#[async_trait]
impl AllocationRepositoryTrait for AllocationRepository {
    async fn create(&self, new_allocation: NewAllocation) -> Result<Allocation> {
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<Allocation> {
                let id = new_allocation
                    .id
                    .clone()
                    .unwrap_or_else(|| Uuid::new_v4().to_string());
                let row = AllocationDB::from_new(new_allocation, id, Utc::now());

                let inserted = diesel::insert_into(allocations::table)
                    .values(&row)
                    .returning(AllocationDB::as_returning())
                    .get_result(conn)
                    .map_err(StorageError::from)?;
                Ok(Allocation::try_from(inserted)?)
            })
            .await
    }

    async fn update_performance(&self, update: AllocationPerformanceUpdate) -> Result<Allocation> {
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<Allocation> {
                let mut allocation = find_allocation(conn, &update.id)?;
                if let Some(distributions) = update.distributions_paid {
                    allocation.distributions_paid = distributions;
                }
                if let Some(market_value) = update.market_value {
                    allocation.market_value = market_value;
                }

                diesel::update(allocations::table.find(&update.id))
                    .set((
                        allocations::distributions_paid
                            .eq(decimal_to_text(&allocation.distributions_paid)),
                        allocations::market_value.eq(decimal_to_text(&allocation.market_value)),
                        allocations::updated_at.eq(datetime_to_text(&Utc::now())),
                    ))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                find_allocation(conn, &update.id)
            })
            .await
    }

    async fn update_status(
        &self,
        allocation_id: &str,
        status: AllocationStatus,
    ) -> Result<Allocation> {
        let allocation_id = allocation_id.to_string();
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<Allocation> {
                find_allocation(conn, &allocation_id)?;
                diesel::update(allocations::table.find(&allocation_id))
                    .set((
                        allocations::status.eq(status.as_str()),
                        allocations::updated_at.eq(datetime_to_text(&Utc::now())),
                    ))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                find_allocation(conn, &allocation_id)
            })
            .await
    }

    async fn delete(&self, allocation_id: &str) -> Result<usize> {
        let allocation_id = allocation_id.to_string();
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<usize> {
                // Tombstoned calls still hold the foreign key.
                let referencing: i64 = capital_calls::table
                    .filter(capital_calls::allocation_id.eq(&allocation_id))
                    .count()
                    .get_result(conn)
                    .map_err(StorageError::from)?;
                if referencing > 0 {
                    return Err(ValidationError::field(
                        "allocationId",
                        format!(
                            "{} capital call(s) still reference allocation {}",
                            referencing, allocation_id
                        ),
                    )
                    .into());
                }

                let deleted = diesel::delete(allocations::table.find(&allocation_id))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                debug!("Deleted {} allocation row(s) for {}", deleted, allocation_id);
                Ok(deleted)
            })
            .await
    }

    fn get_by_id(&self, allocation_id: &str) -> Result<Allocation> {
        let mut conn = get_connection(&self.pool)?;
        find_allocation(&mut conn, allocation_id)
    }

    fn list_by_fund(&self, fund_id: &str) -> Result<Vec<Allocation>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = allocations::table
            .filter(allocations::fund_id.eq(fund_id))
            .order((allocations::commitment_date.asc(), allocations::id.asc()))
            .select(AllocationDB::as_select())
            .load::<AllocationDB>(&mut conn)
            .into_core()?;
        to_allocations(rows)
    }

    fn list_by_deal(&self, deal_id: &str) -> Result<Vec<Allocation>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = allocations::table
            .filter(allocations::deal_id.eq(deal_id))
            .order((allocations::commitment_date.asc(), allocations::id.asc()))
            .select(AllocationDB::as_select())
            .load::<AllocationDB>(&mut conn)
            .into_core()?;
        to_allocations(rows)
    }
}
