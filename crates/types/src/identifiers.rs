//! Domain-specific identifier types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Process identifier.
///
/// Always in `[0, N)` for a run with `N` processes. Stable for the lifetime
/// of the run.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ProcessId(pub u32);

impl ProcessId {
    /// Get the id as an index into per-process tables.
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Check whether this id addresses one of `n` processes.
    pub fn is_valid_for(self, n: usize) -> bool {
        self.index() < n
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

impl From<u32> for ProcessId {
    fn from(id: u32) -> Self {
        ProcessId(id)
    }
}

/// Lamport logical clock value.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// Clock value before any event has happened.
    pub const ZERO: Self = Timestamp(0);

    /// Get the next clock value.
    pub fn next(self) -> Self {
        Timestamp(self.0 + 1)
    }

    /// Lamport merge: the later of two clock values.
    pub fn merge(self, other: Timestamp) -> Self {
        self.max(other)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// Priority of a critical-section request.
///
/// Ordered by timestamp first, then by process id. The smaller value wins,
/// so two requests stamped with the same clock value are always resolved
/// in favour of the lower process id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Priority {
    /// Request timestamp.
    pub timestamp: Timestamp,
    /// Requesting process.
    pub process: ProcessId,
}

impl Priority {
    /// Create a new priority.
    pub fn new(timestamp: Timestamp, process: ProcessId) -> Self {
        Self { timestamp, process }
    }

    /// Check whether this request should be served before `other`.
    pub fn outranks(&self, other: &Priority) -> bool {
        self < other
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.timestamp, self.process)
    }
}
