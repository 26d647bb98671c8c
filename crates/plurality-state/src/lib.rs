//! Plurality State Engine - Aggregation of conflicting assertions
//!
//! This crate implements the pure, synchronous core of the index:
//! - Per-author aggregate snapshots
//! - Recency tracking for "latest value" semantics
//! - The streaming fold (silent backlog, snapshot at the phase marker, live deltas)
//! - Trust-based resolution of a snapshot to one value

pub mod snapshot;
pub mod recency;
pub mod fold;
pub mod resolve;

pub use snapshot::*;
pub use recency::*;
pub use fold::*;
pub use resolve::*;
