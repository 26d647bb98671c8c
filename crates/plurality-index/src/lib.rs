//! Plurality Index - Socially resolved values over an append-only log
//!
//! This crate composes the source and state layers into the public API:
//! - Point queries: `social_values`, `social_value`, `latest_value`, `latest_values`
//! - Live streams: `social_values_stream`, `social_value_stream`, `latest_value_stream`
//! - Raw filtered reads and the operation manifest
//!
//! Every query owns its own aggregation state; queries never share anything
//! mutable, so none of this needs locking.

pub mod config;
pub mod index;
pub mod telemetry;

pub use config::*;
pub use index::*;
pub use telemetry::init_tracing;
