//! Protocol violations.

use crate::ProcessState;
use maekawa_messages::Message;
use maekawa_types::ProcessId;
use thiserror::Error;

/// Internal invariant broken by the caller or by a peer.
///
/// These are programming errors, never contention: a runner that sees one
/// aborts the run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolViolation {
    /// `RequestCS` outside the `Released` state.
    #[error("{id} requested the critical section while {state}")]
    NotReleased { id: ProcessId, state: ProcessState },

    /// `ReleaseCS` outside the `Held` state.
    #[error("{id} released the critical section while {state}")]
    NotHeld { id: ProcessId, state: ProcessState },

    /// GRANT for a request the process is not waiting on.
    #[error("{id} got an unexpected grant ({message}) while {state}")]
    UnexpectedGrant {
        id: ProcessId,
        state: ProcessState,
        message: Message,
    },

    /// Message delivered to the wrong process.
    #[error("{id} received a message addressed elsewhere: {message}")]
    ForeignMessage { id: ProcessId, message: Message },
}
