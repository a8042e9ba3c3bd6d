//! Allocation repository and service traits.

use async_trait::async_trait;

use super::allocations_model::{
    Allocation, AllocationPerformanceUpdate, AllocationStatus, NewAllocation,
};
use crate::errors::Result;

/// Persistence contract for allocations.
#[async_trait]
pub trait AllocationRepositoryTrait: Send + Sync {
    /// Inserts a new allocation. The input is already validated and normalized.
    async fn create(&self, new_allocation: NewAllocation) -> Result<Allocation>;

    async fn update_performance(&self, update: AllocationPerformanceUpdate) -> Result<Allocation>;

    async fn update_status(&self, allocation_id: &str, status: AllocationStatus)
        -> Result<Allocation>;

    /// Deletes an allocation. Fails while capital calls still reference it.
    async fn delete(&self, allocation_id: &str) -> Result<usize>;

    fn get_by_id(&self, allocation_id: &str) -> Result<Allocation>;

    fn list_by_fund(&self, fund_id: &str) -> Result<Vec<Allocation>>;

    fn list_by_deal(&self, deal_id: &str) -> Result<Vec<Allocation>>;
}

#[async_trait]
pub trait AllocationServiceTrait: Send + Sync {
    async fn create_allocation(&self, new_allocation: NewAllocation) -> Result<Allocation>;

    /// Updates distributions and/or market value.
    async fn update_performance(&self, update: AllocationPerformanceUpdate) -> Result<Allocation>;

    /// Marks the allocation as `unfunded`.
    async fn mark_unfunded(&self, allocation_id: &str) -> Result<Allocation>;

    async fn delete_allocation(&self, allocation_id: &str) -> Result<()>;

    fn get_allocation(&self, allocation_id: &str) -> Result<Allocation>;

    fn list_by_fund(&self, fund_id: &str) -> Result<Vec<Allocation>>;

    fn list_by_deal(&self, deal_id: &str) -> Result<Vec<Allocation>>;
}
