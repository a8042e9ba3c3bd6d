//! Funding events emitted after allocations, calls or payments change.
//!
//! The host application implements [`DomainEventSink`] to fan these out to
//! notifications and dashboards.

mod domain_event;
mod sink;

pub use domain_event::*;
pub use sink::*;
