//! Dealflow Core - capital-call and funding lifecycle engine.
//!
//! Turns a fund's commitment to a deal into a schedule of capital calls,
//! applies payments against those calls and derives performance ratios.
//! It is database-agnostic and defines traits that are implemented by the
//! `storage-sqlite` crate.

pub mod allocations;
pub mod capital_calls;
pub mod constants;
pub mod dates;
pub mod errors;
pub mod events;
pub mod performance;
pub mod settings;
pub mod timeline;

pub use errors::Error;
pub use errors::Result;
