#[cfg(test)]
mod tests {
    use crate::allocations::*;
    use crate::dates::DateNormalizer;
    use crate::errors::{Error, Result};
    use crate::events::{DomainEvent, MockDomainEventSink};
    use crate::timeline::{NewTimelineEntry, TimelineEntry, TimelineRepositoryTrait};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct MockAllocationRepository {
        allocations: Mutex<Vec<Allocation>>,
        referenced: Mutex<Vec<String>>,
    }

    impl MockAllocationRepository {
        fn find_mut<T>(&self, id: &str, f: impl FnOnce(&mut Allocation) -> T) -> Result<T> {
            let mut allocations = self.allocations.lock().unwrap();
            let allocation = allocations
                .iter_mut()
                .find(|a| a.id == id)
                .ok_or_else(|| Error::not_found("allocation", id))?;
            Ok(f(allocation))
        }
    }

    #[async_trait]
    impl AllocationRepositoryTrait for MockAllocationRepository {
        async fn create(&self, new_allocation: NewAllocation) -> Result<Allocation> {
            let now = Utc::now();
            let allocation = Allocation {
                id: new_allocation.id.unwrap_or_else(|| "generated".to_string()),
                fund_id: new_allocation.fund_id,
                deal_id: new_allocation.deal_id,
                committed_amount: new_allocation.committed_amount,
                commitment_date: new_allocation.commitment_date,
                status: AllocationStatus::Committed,
                distributions_paid: new_allocation.distributions_paid,
                market_value: new_allocation.market_value,
                created_at: now,
                updated_at: now,
            };
            self.allocations.lock().unwrap().push(allocation.clone());
            Ok(allocation)
        }

        async fn update_performance(&self, update: AllocationPerformanceUpdate) -> Result<Allocation> {
            self.find_mut(&update.id, |a| {
                if let Some(d) = update.distributions_paid {
                    a.distributions_paid = d;
                }
                if let Some(mv) = update.market_value {
                    a.market_value = mv;
                }
                a.clone()
            })
        }

        async fn update_status(&self, allocation_id: &str, status: AllocationStatus) -> Result<Allocation> {
            self.find_mut(allocation_id, |a| {
                a.status = status;
                a.clone()
            })
        }

        async fn delete(&self, allocation_id: &str) -> Result<usize> {
            if self.referenced.lock().unwrap().iter().any(|id| id == allocation_id) {
                return Err(Error::Repository(format!(
                    "allocation {} still has capital calls",
                    allocation_id
                )));
            }
            let mut allocations = self.allocations.lock().unwrap();
            let before = allocations.len();
            allocations.retain(|a| a.id != allocation_id);
            Ok(before - allocations.len())
        }

        fn get_by_id(&self, allocation_id: &str) -> Result<Allocation> {
            self.find_mut(allocation_id, |a| a.clone())
        }

        fn list_by_fund(&self, fund_id: &str) -> Result<Vec<Allocation>> {
            Ok(self
                .allocations
                .lock()
                .unwrap()
                .iter()
                .filter(|a| a.fund_id == fund_id)
                .cloned()
                .collect())
        }

        fn list_by_deal(&self, deal_id: &str) -> Result<Vec<Allocation>> {
            Ok(self
                .allocations
                .lock()
                .unwrap()
                .iter()
                .filter(|a| a.deal_id == deal_id)
                .cloned()
                .collect())
        }
    }

    #[derive(Default)]
    struct RecordingTimeline {
        entries: Mutex<Vec<NewTimelineEntry>>,
    }

    #[async_trait]
    impl TimelineRepositoryTrait for RecordingTimeline {
        async fn append(&self, entry: NewTimelineEntry) -> Result<TimelineEntry> {
            self.entries.lock().unwrap().push(entry.clone());
            Ok(TimelineEntry {
                id: "t".to_string(),
                deal_id: entry.deal_id,
                entity_type: entry.entity_type,
                entity_id: entry.entity_id,
                action: entry.action,
                description: entry.description,
                user_id: entry.user_id,
                metadata: entry.metadata,
                created_at: Utc::now(),
            })
        }

        fn list_by_deal(&self, _deal_id: &str) -> Result<Vec<TimelineEntry>> {
            Ok(Vec::new())
        }

        fn list_for_entity(&self, _entity_type: &str, _entity_id: &str) -> Result<Vec<TimelineEntry>> {
            Ok(Vec::new())
        }
    }

    struct Setup {
        repository: Arc<MockAllocationRepository>,
        timeline: Arc<RecordingTimeline>,
        events: MockDomainEventSink,
        service: AllocationService,
    }

    fn setup() -> Setup {
        let repository = Arc::new(MockAllocationRepository::default());
        let timeline = Arc::new(RecordingTimeline::default());
        let events = MockDomainEventSink::new();
        let service = AllocationService::new(
            repository.clone(),
            timeline.clone(),
            Arc::new(events.clone()),
            DateNormalizer::default(),
        );
        Setup {
            repository,
            timeline,
            events,
            service,
        }
    }

    fn new_allocation() -> NewAllocation {
        NewAllocation {
            id: Some("alloc-1".to_string()),
            fund_id: "fund-1".to_string(),
            deal_id: "deal-1".to_string(),
            committed_amount: dec!(1000000),
            commitment_date: Utc.with_ymd_and_hms(2025, 1, 15, 22, 45, 0).unwrap(),
            distributions_paid: Decimal::ZERO,
            market_value: Decimal::ZERO,
        }
    }

    #[tokio::test]
    async fn test_create_normalizes_and_records() {
        let s = setup();
        let allocation = s.service.create_allocation(new_allocation()).await.unwrap();

        assert_eq!(
            allocation.commitment_date,
            Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap()
        );
        assert_eq!(allocation.status, AllocationStatus::Committed);
        assert_eq!(s.timeline.entries.lock().unwrap().len(), 1);
        assert!(matches!(
            s.events.events().as_slice(),
            [DomainEvent::AllocationsChanged { .. }]
        ));
    }

    #[tokio::test]
    async fn test_create_rejects_non_positive_commitment() {
        let s = setup();
        let mut new = new_allocation();
        new.committed_amount = dec!(-5);
        assert!(matches!(
            s.service.create_allocation(new).await,
            Err(Error::Validation(_))
        ));
        assert!(s.events.is_empty());
    }

    #[tokio::test]
    async fn test_update_performance_and_unfunded() {
        let s = setup();
        s.service.create_allocation(new_allocation()).await.unwrap();

        let updated = s
            .service
            .update_performance(AllocationPerformanceUpdate {
                id: "alloc-1".to_string(),
                distributions_paid: Some(dec!(300000)),
                market_value: None,
            })
            .await
            .unwrap();
        assert_eq!(updated.distributions_paid, dec!(300000));

        let unfunded = s.service.mark_unfunded("alloc-1").await.unwrap();
        assert_eq!(unfunded.status, AllocationStatus::Unfunded);
        assert_eq!(s.service.list_by_fund("fund-1").unwrap().len(), 1);
        assert_eq!(s.service.list_by_deal("deal-1").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_is_restricted_while_referenced() {
        let s = setup();
        s.service.create_allocation(new_allocation()).await.unwrap();
        s.repository
            .referenced
            .lock()
            .unwrap()
            .push("alloc-1".to_string());

        assert!(s.service.delete_allocation("alloc-1").await.is_err());
        assert!(s.service.get_allocation("alloc-1").is_ok());

        s.repository.referenced.lock().unwrap().clear();
        s.service.delete_allocation("alloc-1").await.unwrap();
        assert!(matches!(
            s.service.get_allocation("alloc-1"),
            Err(Error::NotFound { .. })
        ));
    }
}
