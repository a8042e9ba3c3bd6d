//! SQLite storage implementation for capital calls and their payments.

mod model;
mod repository;

pub use model::{CapitalCallDB, CapitalCallPaymentDB};
pub use repository::CapitalCallRepository;
