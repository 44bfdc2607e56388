//! Structured trace of a run.

use maekawa_core::ProcessState;
use maekawa_messages::Message;
use maekawa_types::ProcessId;
use serde::Serialize;

/// One observable step of a simulation.
///
/// Serializes to a flat JSON object tagged by `event`, suitable for one line
/// per event in machine-readable output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TraceEvent {
    /// A process handed a message to the bus.
    Sent {
        iteration: u64,
        #[serde(flatten)]
        message: Message,
    },

    /// The bus delivered a message to its receiver.
    Delivered {
        iteration: u64,
        #[serde(flatten)]
        message: Message,
    },

    /// A process changed critical-section state.
    StateChanged {
        iteration: u64,
        process: ProcessId,
        from: ProcessState,
        to: ProcessState,
    },
}

impl TraceEvent {
    /// Iteration the event happened in.
    pub fn iteration(&self) -> u64 {
        match self {
            TraceEvent::Sent { iteration, .. }
            | TraceEvent::Delivered { iteration, .. }
            | TraceEvent::StateChanged { iteration, .. } => *iteration,
        }
    }
}
