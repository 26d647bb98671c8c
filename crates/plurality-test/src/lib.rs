//! Plurality Test Harness - Fuzzing and scenario validation
//!
//! This crate provides:
//! - Seeded assertion-sequence fuzzing of the aggregation engine
//! - A scenario builder for end-to-end index checks over an in-memory log

pub mod fuzzer;
pub mod scenario;

pub use fuzzer::*;
pub use scenario::*;
