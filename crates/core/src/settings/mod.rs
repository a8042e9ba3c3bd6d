//! Settings module - engine configuration loaded from the environment.

mod settings_model;

pub use settings_model::*;
