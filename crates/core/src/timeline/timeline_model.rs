//! Deal timeline models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{errors::ValidationError, Result};

pub const ENTITY_ALLOCATION: &str = "allocation";
pub const ENTITY_CAPITAL_CALL: &str = "capital_call";

pub const ACTION_ALLOCATION_CREATED: &str = "allocation_created";
pub const ACTION_CAPITAL_CALLS_SCHEDULED: &str = "capital_calls_scheduled";
pub const ACTION_CAPITAL_CALL_STATUS_CHANGED: &str = "capital_call_status_changed";
pub const ACTION_CAPITAL_CALL_DATES_CHANGED: &str = "capital_call_dates_changed";
pub const ACTION_CAPITAL_CALL_DELETED: &str = "capital_call_deleted";
pub const ACTION_PAYMENT_RECORDED: &str = "payment_recorded";

/// Append-only activity record on a deal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEntry {
    pub id: String,
    pub deal_id: String,
    pub entity_type: String,
    pub entity_id: String,
    pub action: String,
    pub description: String,
    pub user_id: Option<String>,
    pub metadata: Option<Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewTimelineEntry {
    pub deal_id: String,
    pub entity_type: String,
    pub entity_id: String,
    pub action: String,
    pub description: String,
    pub user_id: Option<String>,
    pub metadata: Option<Value>,
}

impl NewTimelineEntry {
    pub fn new(
        deal_id: impl Into<String>,
        entity_type: &str,
        entity_id: impl Into<String>,
        action: &str,
        description: impl Into<String>,
    ) -> Self {
        Self {
            deal_id: deal_id.into(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.into(),
            action: action.to_string(),
            description: description.into(),
            user_id: None,
            metadata: None,
        }
    }

    pub fn with_user(mut self, user_id: Option<String>) -> Self {
        self.user_id = user_id;
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("dealId", &self.deal_id),
            ("entityType", &self.entity_type),
            ("entityId", &self.entity_id),
            ("action", &self.action),
        ] {
            if value.trim().is_empty() {
                return Err(ValidationError::MissingField(field.to_string()).into());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder() {
        let entry = NewTimelineEntry::new(
            "deal-1",
            ENTITY_CAPITAL_CALL,
            "call-1",
            ACTION_PAYMENT_RECORDED,
            "Payment of 40000 recorded",
        )
        .with_user(Some("user-9".to_string()))
        .with_metadata(json!({ "amount": "40000" }));

        assert!(entry.validate().is_ok());
        assert_eq!(entry.user_id.as_deref(), Some("user-9"));
        assert_eq!(entry.metadata.unwrap()["amount"], "40000");
    }

    #[test]
    fn test_missing_deal_id() {
        let entry = NewTimelineEntry::new("", ENTITY_ALLOCATION, "a", ACTION_ALLOCATION_CREATED, "");
        assert!(entry.validate().is_err());
    }
}
