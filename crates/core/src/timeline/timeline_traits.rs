use async_trait::async_trait;

use super::timeline_model::{NewTimelineEntry, TimelineEntry};
use crate::errors::Result;

/// Append-only store of deal activity.
#[async_trait]
pub trait TimelineRepositoryTrait: Send + Sync {
    async fn append(&self, entry: NewTimelineEntry) -> Result<TimelineEntry>;

    /// Entries of a deal, newest first.
    fn list_by_deal(&self, deal_id: &str) -> Result<Vec<TimelineEntry>>;

    fn list_for_entity(&self, entity_type: &str, entity_id: &str) -> Result<Vec<TimelineEntry>>;
}
