use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel::SqliteConnection;
use std::sync::Arc;
use uuid::Uuid;

use dealflow_core::errors::Error;
use dealflow_core::timeline::{NewTimelineEntry, TimelineEntry, TimelineRepositoryTrait};
use dealflow_core::Result;

use super::model::TimelineEntryDB;
use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::{IntoCore, StorageError};
use crate::schema::deal_timeline;

pub struct TimelineRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl TimelineRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        TimelineRepository { pool, writer }
    }
}

fn to_entries(rows: Vec<TimelineEntryDB>) -> Result<Vec<TimelineEntry>> {
    rows.into_iter()
        .map(|row| TimelineEntry::try_from(row).map_err(Error::from))
        .collect()
}

#[async_trait]
impl TimelineRepositoryTrait for TimelineRepository {
    async fn append(&self, entry: NewTimelineEntry) -> Result<TimelineEntry> {
        entry.validate()?;
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<TimelineEntry> {
                let row = TimelineEntryDB::from_new(Uuid::new_v4().to_string(), entry, Utc::now())?;
                let inserted = diesel::insert_into(deal_timeline::table)
                    .values(&row)
                    .returning(TimelineEntryDB::as_returning())
                    .get_result(conn)
                    .map_err(StorageError::from)?;
                Ok(TimelineEntry::try_from(inserted)?)
            })
            .await
    }

    fn list_by_deal(&self, deal_id: &str) -> Result<Vec<TimelineEntry>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = deal_timeline::table
            .filter(deal_timeline::deal_id.eq(deal_id))
            .order((deal_timeline::created_at.desc(), deal_timeline::id.desc()))
            .select(TimelineEntryDB::as_select())
            .load::<TimelineEntryDB>(&mut conn)
            .into_core()?;
        to_entries(rows)
    }

    fn list_for_entity(&self, entity_type: &str, entity_id: &str) -> Result<Vec<TimelineEntry>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = deal_timeline::table
            .filter(deal_timeline::entity_type.eq(entity_type))
            .filter(deal_timeline::entity_id.eq(entity_id))
            .order((deal_timeline::created_at.desc(), deal_timeline::id.desc()))
            .select(TimelineEntryDB::as_select())
            .load::<TimelineEntryDB>(&mut conn)
            .into_core()?;
        to_entries(rows)
    }
}
