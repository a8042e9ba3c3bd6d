//! Performance module - MOIC, TVPI, DPI, RVPI and IRR.

mod calculator;
mod performance_model;
mod performance_service;
mod performance_traits;

pub use calculator::PerformanceCalculator;
pub use performance_model::{AllocationPerformance, FundPerformance};
pub use performance_service::PerformanceService;
pub use performance_traits::PerformanceServiceTrait;
