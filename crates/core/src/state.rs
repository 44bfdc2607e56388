//! Critical-section state of a process.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a process stands with respect to the critical section.
///
/// Cycles `Released -> Wanted -> Held -> Released` indefinitely.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessState {
    /// Idle; not interested in the critical section.
    #[default]
    Released,
    /// Request sent, collecting votes.
    Wanted,
    /// Inside the critical section.
    Held,
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProcessState::Released => "RELEASED",
            ProcessState::Wanted => "WANTED",
            ProcessState::Held => "HELD",
        })
    }
}
