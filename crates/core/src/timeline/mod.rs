//! Deal timeline: the append-only audit trail the funding engine writes to.

mod timeline_model;
mod timeline_traits;

pub use timeline_model::*;
pub use timeline_traits::TimelineRepositoryTrait;
