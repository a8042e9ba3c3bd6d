//! Calendar date handling for the funding engine.

mod date_normalizer;

pub use date_normalizer::DateNormalizer;
