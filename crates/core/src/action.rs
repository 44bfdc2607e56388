//! Outbound actions.

use maekawa_messages::Message;
use maekawa_types::{ProcessId, Timestamp};

/// Actions a state machine asks its runner to perform.
///
/// The runner handles the actual message delivery; the state machine only
/// describes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Hand a message to the bus.
    Send(Message),

    /// The process just moved `Wanted -> Held`.
    EnteredCriticalSection {
        id: ProcessId,
        timestamp: Timestamp,
    },

    /// The process just moved `Held -> Released`.
    ExitedCriticalSection { id: ProcessId },
}
