//! Allocations module - fund commitments to deals.

mod allocations_model;
mod allocations_service;
mod allocations_traits;

mod allocations_service_tests;

pub use allocations_model::*;
pub use allocations_service::AllocationService;
pub use allocations_traits::{AllocationRepositoryTrait, AllocationServiceTrait};
