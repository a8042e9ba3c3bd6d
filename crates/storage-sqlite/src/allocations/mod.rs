//! SQLite storage implementation for allocations.

mod model;
mod repository;

pub use model::AllocationDB;
pub(crate) use repository::find_allocation;
pub use repository::AllocationRepository;
