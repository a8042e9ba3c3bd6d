//! SQLite storage implementation for the deal timeline.

mod model;
mod repository;

pub use model::TimelineEntryDB;
pub use repository::TimelineRepository;
