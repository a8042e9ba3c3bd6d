use async_trait::async_trait;
use log::{debug, warn};
use serde_json::json;
use std::sync::Arc;

use super::allocations_model::{
    Allocation, AllocationPerformanceUpdate, AllocationStatus, NewAllocation,
};
use super::allocations_traits::{AllocationRepositoryTrait, AllocationServiceTrait};
use crate::dates::DateNormalizer;
use crate::errors::Result;
use crate::events::{DomainEvent, DomainEventSink};
use crate::timeline::{
    NewTimelineEntry, TimelineRepositoryTrait, ACTION_ALLOCATION_CREATED, ENTITY_ALLOCATION,
};

/// Service for managing fund commitments to deals.
pub struct AllocationService {
    repository: Arc<dyn AllocationRepositoryTrait>,
    timeline: Arc<dyn TimelineRepositoryTrait>,
    event_sink: Arc<dyn DomainEventSink>,
    normalizer: DateNormalizer,
}

impl AllocationService {
    pub fn new(
        repository: Arc<dyn AllocationRepositoryTrait>,
        timeline: Arc<dyn TimelineRepositoryTrait>,
        event_sink: Arc<dyn DomainEventSink>,
        normalizer: DateNormalizer,
    ) -> Self {
        Self {
            repository,
            timeline,
            event_sink,
            normalizer,
        }
    }

    fn emit_changed(&self, allocation: &Allocation) {
        self.event_sink.emit(DomainEvent::allocations_changed(
            vec![allocation.id.clone()],
            vec![allocation.fund_id.clone()],
            vec![allocation.deal_id.clone()],
        ));
    }
}

#[async_trait]
impl AllocationServiceTrait for AllocationService {
    async fn create_allocation(&self, mut new_allocation: NewAllocation) -> Result<Allocation> {
        new_allocation.validate()?;
        new_allocation.commitment_date = self.normalizer.normalize(new_allocation.commitment_date);
        debug!(
            "Creating allocation of {} from fund {} to deal {}",
            new_allocation.committed_amount, new_allocation.fund_id, new_allocation.deal_id
        );

        let allocation = self.repository.create(new_allocation).await?;

        let entry = NewTimelineEntry::new(
            allocation.deal_id.clone(),
            ENTITY_ALLOCATION,
            allocation.id.clone(),
            ACTION_ALLOCATION_CREATED,
            format!(
                "Fund {} committed {}",
                allocation.fund_id, allocation.committed_amount
            ),
        )
        .with_metadata(json!({
            "fundId": allocation.fund_id,
            "committedAmount": allocation.committed_amount.to_string(),
        }));
        if let Err(e) = self.timeline.append(entry).await {
            warn!(
                "Failed to append timeline entry for allocation {}: {}",
                allocation.id, e
            );
        }

        self.emit_changed(&allocation);
        Ok(allocation)
    }

    async fn update_performance(&self, update: AllocationPerformanceUpdate) -> Result<Allocation> {
        update.validate()?;
        let allocation = self.repository.update_performance(update).await?;
        self.emit_changed(&allocation);
        Ok(allocation)
    }

    async fn mark_unfunded(&self, allocation_id: &str) -> Result<Allocation> {
        let allocation = self
            .repository
            .update_status(allocation_id, AllocationStatus::Unfunded)
            .await?;
        self.emit_changed(&allocation);
        Ok(allocation)
    }

    async fn delete_allocation(&self, allocation_id: &str) -> Result<()> {
        let allocation = self.repository.get_by_id(allocation_id)?;
        self.repository.delete(allocation_id).await?;
        self.emit_changed(&allocation);
        Ok(())
    }

    fn get_allocation(&self, allocation_id: &str) -> Result<Allocation> {
        self.repository.get_by_id(allocation_id)
    }

    fn list_by_fund(&self, fund_id: &str) -> Result<Vec<Allocation>> {
        self.repository.list_by_fund(fund_id)
    }

    fn list_by_deal(&self, deal_id: &str) -> Result<Vec<Allocation>> {
        self.repository.list_by_deal(deal_id)
    }
}
