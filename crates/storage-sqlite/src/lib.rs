//! SQLite storage implementation for the Dealflow funding engine.
//!
//! Implements the repository traits defined in `dealflow-core` using Diesel
//! ORM with SQLite:
//! - Database connection pooling and management
//! - Embedded Diesel migrations
//! - A single writer actor that serializes every write transaction
//! - Repository implementations for allocations, capital calls and the deal timeline
//!
//! This crate is the only place in the workspace where Diesel dependencies exist.
//!
//! ```text
//!          core (domain, traits)
//!                  │
//!                  ▼
//!          storage-sqlite (this crate)
//!                  │
//!                  ▼
//!              SQLite DB
//! ```

pub mod db;
pub mod errors;
pub mod schema;
pub mod utils;

// Repository implementations
pub mod allocations;
pub mod capital_calls;
pub mod timeline;

// Re-export database utilities
pub use db::{
    create_pool, get_connection, get_db_path, init, open, open_path, run_migrations,
    spawn_writer, DbConnection, DbPool, WriteHandle,
};

pub use allocations::AllocationRepository;
pub use capital_calls::CapitalCallRepository;
pub use timeline::TimelineRepository;

// Re-export storage errors and conversion helpers
pub use errors::{IntoCore, StorageError};

// Re-export from dealflow-core for convenience
pub use dealflow_core::errors::{DatabaseError, Error, Result};
