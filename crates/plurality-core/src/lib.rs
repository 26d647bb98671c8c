//! Plurality Core - Fundamental types and primitives
//!
//! This crate defines the types shared by every layer of the index:
//! - References (FeedId, MsgId, Destination) and their classification
//! - Assertion payloads and tombstones
//! - Raw log messages, log positions and the backlog/live phase marker
//! - Error types

pub mod id;
pub mod value;
pub mod message;
pub mod error;

pub use id::*;
pub use value::*;
pub use message::*;
pub use error::*;
