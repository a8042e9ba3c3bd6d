use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::SqliteConnection;
use log::debug;
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

use dealflow_core::allocations::derive_allocation_status;
use dealflow_core::capital_calls::{
    CallSpec, CapitalCall, CapitalCallLedger, CapitalCallPayment, CapitalCallRepositoryTrait,
    CapitalCallStatus, NewCapitalCallPayment, PaymentApplication, PaymentDecision,
    PaymentReconciler, StatusTransition,
};
use dealflow_core::errors::Error;
use dealflow_core::Result;

use super::model::{CapitalCallDB, CapitalCallPaymentDB};
use crate::allocations::find_allocation;
use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::{IntoCore, StorageError};
use crate::schema::{allocations, capital_call_payments, capital_calls};
use crate::utils::{datetime_to_text, decimal_to_text, text_to_decimal};

const OPEN_STATUSES: [&str; 3] = ["scheduled", "called", "partial"];

pub struct CapitalCallRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl CapitalCallRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        CapitalCallRepository { pool, writer }
    }
}

fn to_calls(rows: Vec<CapitalCallDB>) -> Result<Vec<CapitalCall>> {
    rows.into_iter()
        .map(|row| CapitalCall::try_from(row).map_err(Error::from))
        .collect()
}

fn find_call(conn: &mut SqliteConnection, call_id: &str) -> Result<CapitalCall> {
    let row = capital_calls::table
        .find(call_id)
        .select(CapitalCallDB::as_select())
        .first::<CapitalCallDB>(conn)
        .optional()
        .into_core()?
        .ok_or_else(|| Error::not_found("capital_call", call_id))?;
    Ok(CapitalCall::try_from(row)?)
}

fn load_payments(conn: &mut SqliteConnection, call_id: &str) -> Result<Vec<CapitalCallPayment>> {
    let rows = capital_call_payments::table
        .filter(capital_call_payments::capital_call_id.eq(call_id))
        .order((
            capital_call_payments::created_at.asc(),
            capital_call_payments::payment_date.asc(),
        ))
        .select(CapitalCallPaymentDB::as_select())
        .load::<CapitalCallPaymentDB>(conn)
        .into_core()?;
    rows.into_iter()
        .map(|row| CapitalCallPayment::try_from(row).map_err(Error::from))
        .collect()
}

fn touch_status(
    conn: &mut SqliteConnection,
    call_id: &str,
    status: CapitalCallStatus,
) -> Result<()> {
    diesel::update(capital_calls::table.find(call_id))
        .set((
            capital_calls::status.eq(status.as_str()),
            capital_calls::updated_at.eq(datetime_to_text(&Utc::now())),
        ))
        .execute(conn)
        .map_err(StorageError::from)?;
    Ok(())
}

/// Recomputes the allocation status from the paid amounts of its live calls.
fn refresh_allocation_status(conn: &mut SqliteConnection, allocation_id: &str) -> Result<()> {
    let allocation = find_allocation(conn, allocation_id)?;
    let (current, committed) = (allocation.status, allocation.committed_amount);

    let paid_amounts: Vec<String> = capital_calls::table
        .filter(capital_calls::allocation_id.eq(allocation_id))
        .filter(capital_calls::is_deleted.eq(false))
        .select(capital_calls::paid_amount)
        .load(conn)
        .into_core()?;
    let mut total_paid = Decimal::ZERO;
    for paid in &paid_amounts {
        total_paid += text_to_decimal(paid, "paid_amount")?;
    }

    let next = derive_allocation_status(current, total_paid, committed);
    if next != current {
        debug!(
            "Allocation {} moves from {} to {} (paid {} of {})",
            allocation_id, current, next, total_paid, committed
        );
        diesel::update(allocations::table.find(allocation_id))
            .set((
                allocations::status.eq(next.as_str()),
                allocations::updated_at.eq(datetime_to_text(&Utc::now())),
            ))
            .execute(conn)
            .map_err(StorageError::from)?;
    }
    Ok(())
}

#[async_trait]
impl CapitalCallRepositoryTrait for CapitalCallRepository {
    async fn create_calls(
        &self,
        allocation_id: &str,
        calls: Vec<CallSpec>,
        initial_status: CapitalCallStatus,
    ) -> Result<Vec<CapitalCall>> {
        let allocation_id = allocation_id.to_string();
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<Vec<CapitalCall>> {
                find_allocation(conn, &allocation_id)?;

                let now = Utc::now();
                let mut created = Vec::with_capacity(calls.len());
                for spec in calls {
                    let row = CapitalCallDB::from_spec(
                        Uuid::new_v4().to_string(),
                        &allocation_id,
                        spec,
                        initial_status,
                        now,
                    );
                    let inserted = diesel::insert_into(capital_calls::table)
                        .values(&row)
                        .returning(CapitalCallDB::as_returning())
                        .get_result(conn)
                        .map_err(StorageError::from)?;
                    created.push(CapitalCall::try_from(inserted)?);
                }
                debug!(
                    "Inserted {} capital call(s) for allocation {}",
                    created.len(),
                    allocation_id
                );
                Ok(created)
            })
            .await
    }

    async fn apply_transition(
        &self,
        call_id: &str,
        target: CapitalCallStatus,
        expected_paid: Option<Decimal>,
    ) -> Result<StatusTransition> {
        let call_id = call_id.to_string();
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<StatusTransition> {
                let call = find_call(conn, &call_id)?;
                let next = CapitalCallLedger::transition_call(&call, target, expected_paid)?;
                touch_status(conn, &call_id, next)?;
                Ok(StatusTransition {
                    capital_call: find_call(conn, &call_id)?,
                    previous_status: call.status,
                })
            })
            .await
    }

    async fn update_dates(
        &self,
        call_id: &str,
        call_date: DateTime<Utc>,
        due_date: DateTime<Utc>,
    ) -> Result<CapitalCall> {
        let call_id = call_id.to_string();
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<CapitalCall> {
                let call = find_call(conn, &call_id)?;
                CapitalCallLedger::check_reschedule(&call, call_date, due_date)?;
                diesel::update(capital_calls::table.find(&call_id))
                    .set((
                        capital_calls::call_date.eq(datetime_to_text(&call_date)),
                        capital_calls::due_date.eq(datetime_to_text(&due_date)),
                        capital_calls::updated_at.eq(datetime_to_text(&Utc::now())),
                    ))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                find_call(conn, &call_id)
            })
            .await
    }

    async fn soft_delete(&self, call_id: &str) -> Result<CapitalCall> {
        let call_id = call_id.to_string();
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<CapitalCall> {
                let call = find_call(conn, &call_id)?;
                if call.is_deleted {
                    return Ok(call);
                }
                let now = datetime_to_text(&Utc::now());
                diesel::update(capital_calls::table.find(&call_id))
                    .set((
                        capital_calls::is_deleted.eq(true),
                        capital_calls::deleted_at.eq(Some(now.clone())),
                        capital_calls::updated_at.eq(now),
                    ))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                find_call(conn, &call_id)
            })
            .await
    }

    async fn record_payment(&self, payment: NewCapitalCallPayment) -> Result<PaymentApplication> {
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<PaymentApplication> {
                // Read-sum-write under the writer's IMMEDIATE transaction.
                let call = find_call(conn, &payment.capital_call_id)?;
                let existing = load_payments(conn, &call.id)?;

                let reconciled = match PaymentReconciler::reconcile(&call, &existing, &payment)? {
                    PaymentDecision::Replay(previous) => {
                        debug!(
                            "Replaying payment {} on capital call {}",
                            previous.id, call.id
                        );
                        return Ok(PaymentApplication {
                            capital_call: call,
                            payment: previous,
                            payments: existing,
                            replayed: true,
                        });
                    }
                    PaymentDecision::Apply(reconciled) => reconciled,
                };

                let now = Utc::now();
                let row = CapitalCallPaymentDB::from_new(
                    Uuid::new_v4().to_string(),
                    payment,
                    reconciled.fingerprint.clone(),
                    now,
                );
                let inserted = diesel::insert_into(capital_call_payments::table)
                    .values(&row)
                    .returning(CapitalCallPaymentDB::as_returning())
                    .get_result(conn)
                    .map_err(StorageError::from)?;
                let stored = CapitalCallPayment::try_from(inserted)?;

                diesel::update(capital_calls::table.find(&call.id))
                    .set((
                        capital_calls::paid_amount.eq(decimal_to_text(&reconciled.paid_amount)),
                        capital_calls::status.eq(reconciled.status.as_str()),
                        capital_calls::updated_at.eq(datetime_to_text(&now)),
                    ))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                refresh_allocation_status(conn, &call.allocation_id)?;

                debug!(
                    "Applied payment {} of {} to capital call {}: paid {}, status {}",
                    stored.id,
                    stored.payment_amount,
                    call.id,
                    reconciled.paid_amount,
                    reconciled.status
                );

                let mut payments = existing;
                payments.push(stored.clone());
                Ok(PaymentApplication {
                    capital_call: find_call(conn, &call.id)?,
                    payment: stored,
                    payments,
                    replayed: false,
                })
            })
            .await
    }

    fn get_by_id(&self, call_id: &str) -> Result<CapitalCall> {
        let mut conn = get_connection(&self.pool)?;
        find_call(&mut conn, call_id)
    }

    fn list_by_allocation(
        &self,
        allocation_id: &str,
        include_deleted: bool,
    ) -> Result<Vec<CapitalCall>> {
        let mut conn = get_connection(&self.pool)?;
        let mut query = capital_calls::table
            .filter(capital_calls::allocation_id.eq(allocation_id))
            .order((capital_calls::call_date.asc(), capital_calls::id.asc()))
            .select(CapitalCallDB::as_select())
            .into_boxed();
        if !include_deleted {
            query = query.filter(capital_calls::is_deleted.eq(false));
        }
        let rows = query.load::<CapitalCallDB>(&mut conn).into_core()?;
        to_calls(rows)
    }

    fn list_by_deal(&self, deal_id: &str) -> Result<Vec<CapitalCall>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = capital_calls::table
            .inner_join(allocations::table)
            .filter(allocations::deal_id.eq(deal_id))
            .filter(capital_calls::is_deleted.eq(false))
            .order((capital_calls::call_date.asc(), capital_calls::id.asc()))
            .select(CapitalCallDB::as_select())
            .load::<CapitalCallDB>(&mut conn)
            .into_core()?;
        to_calls(rows)
    }

    fn list_in_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<CapitalCall>> {
        let mut conn = get_connection(&self.pool)?;
        let (start, end) = (datetime_to_text(&start), datetime_to_text(&end));
        let rows = capital_calls::table
            .filter(capital_calls::is_deleted.eq(false))
            .filter(
                capital_calls::call_date
                    .between(start.clone(), end.clone())
                    .or(capital_calls::due_date.between(start, end)),
            )
            .order((capital_calls::call_date.asc(), capital_calls::id.asc()))
            .select(CapitalCallDB::as_select())
            .load::<CapitalCallDB>(&mut conn)
            .into_core()?;
        to_calls(rows)
    }

    fn list_open(&self) -> Result<Vec<CapitalCall>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = capital_calls::table
            .filter(capital_calls::is_deleted.eq(false))
            .filter(capital_calls::status.eq_any(OPEN_STATUSES))
            .order((capital_calls::due_date.asc(), capital_calls::id.asc()))
            .select(CapitalCallDB::as_select())
            .load::<CapitalCallDB>(&mut conn)
            .into_core()?;
        to_calls(rows)
    }

    fn list_payments(&self, call_id: &str) -> Result<Vec<CapitalCallPayment>> {
        let mut conn = get_connection(&self.pool)?;
        load_payments(&mut conn, call_id)
    }
}
