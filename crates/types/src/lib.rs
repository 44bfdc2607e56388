//! Core types for Maekawa quorum mutual exclusion.
//!
//! - [`ProcessId`], [`Timestamp`], [`Priority`]: who is asking and in what order
//! - [`Quorum`], [`QuorumSystem`], [`QuorumBuilder`]: who must agree
//! - [`ConfigError`]: everything that can be wrong before a run starts

mod error;
mod identifiers;
mod quorum;

pub use error::ConfigError;
pub use identifiers::{Priority, ProcessId, Timestamp};
pub use quorum::{Quorum, QuorumBuilder, QuorumLayout, QuorumSystem};
