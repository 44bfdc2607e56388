//! Configuration errors.

use crate::ProcessId;
use thiserror::Error;

/// Errors in the setup of a run: process counts, quorum layouts, driver options.
///
/// These abort a run before any message is sent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A run needs at least one process.
    #[error("process count must be positive")]
    NoProcesses,

    /// A run needs at least one iteration.
    #[error("iteration count must be positive")]
    ZeroIterations,

    /// A quorum names a process outside `[0, n)`.
    #[error("quorum of {owner} names {member}, but only {n} processes exist")]
    MemberOutOfRange {
        owner: ProcessId,
        member: ProcessId,
        n: usize,
    },

    /// Two quorums share no process, so mutual exclusion cannot hold.
    #[error("quorums of {a} and {b} do not intersect")]
    DisjointQuorums { a: ProcessId, b: ProcessId },

    /// Concurrent requesters per iteration must be in `[1, processes]`.
    #[error("contenders must be between 1 and {processes}, got {contenders}")]
    InvalidContenders { contenders: usize, processes: usize },

    /// Unrecognized or malformed quorum layout.
    #[error("invalid quorum layout: {0}")]
    InvalidLayout(String),

    /// Unrecognized request policy.
    #[error("invalid request policy: {0}")]
    InvalidPolicy(String),

    /// Unrecognized delivery order.
    #[error("invalid delivery order: {0}")]
    InvalidDelivery(String),
}
