//! Database model for deal timeline entries.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use dealflow_core::timeline::{NewTimelineEntry, TimelineEntry};

use crate::errors::StorageError;
use crate::utils::{datetime_to_text, text_to_datetime};

#[derive(Queryable, Insertable, Selectable, PartialEq, Serialize, Deserialize, Debug, Clone)]
#[diesel(table_name = crate::schema::deal_timeline)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[serde(rename_all = "camelCase")]
pub struct TimelineEntryDB {
    pub id: String,
    pub deal_id: String,
    pub entity_type: String,
    pub entity_id: String,
    pub action: String,
    pub description: String,
    pub user_id: Option<String>,
    /// JSON document
    pub metadata: Option<String>,
    pub created_at: String,
}

impl TimelineEntryDB {
    pub fn from_new(
        id: String,
        entry: NewTimelineEntry,
        now: DateTime<Utc>,
    ) -> Result<Self, StorageError> {
        let metadata = entry
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;
        Ok(Self {
            id,
            deal_id: entry.deal_id,
            entity_type: entry.entity_type,
            entity_id: entry.entity_id,
            action: entry.action,
            description: entry.description,
            user_id: entry.user_id,
            metadata,
            created_at: datetime_to_text(&now),
        })
    }
}

impl TryFrom<TimelineEntryDB> for TimelineEntry {
    type Error = StorageError;

    fn try_from(db: TimelineEntryDB) -> Result<Self, Self::Error> {
        let metadata = db
            .metadata
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(|e| StorageError::SerializationError(format!("metadata: {}", e)))?;
        Ok(Self {
            created_at: text_to_datetime(&db.created_at, "created_at")?,
            id: db.id,
            deal_id: db.deal_id,
            entity_type: db.entity_type,
            entity_id: db.entity_id,
            action: db.action,
            description: db.description,
            user_id: db.user_id,
            metadata,
        })
    }
}
