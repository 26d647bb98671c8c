//! Plurality Source Layer - Where assertions come from
//!
//! This crate provides:
//! - The `MessageSource` trait the index queries through
//! - An in-memory append-only log with live tailing
//! - A fault-injecting wrapper for exercising error paths

pub mod source;
pub mod memory;
pub mod fault;

pub use source::*;
pub use memory::*;
pub use fault::{FaultySource, FaultPlan};
