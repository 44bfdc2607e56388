//! Simulation errors.

use maekawa_core::ProtocolViolation;
use maekawa_types::ProcessId;
use thiserror::Error;

/// A message could not be routed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoutingError {
    /// Sender or receiver is outside `[0, n)`.
    #[error("cannot route {from} -> {to}: only {n} processes exist")]
    UnknownProcess {
        from: ProcessId,
        to: ProcessId,
        n: usize,
    },
}

/// Errors that abort a simulation run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimulationError {
    /// Message addressed to a nonexistent process.
    #[error(transparent)]
    Routing(#[from] RoutingError),

    /// A process broke a protocol invariant.
    #[error(transparent)]
    Protocol(#[from] ProtocolViolation),

    /// The driver addressed a nonexistent process.
    #[error("no such process: {0}")]
    UnknownProcess(ProcessId),

    /// More than one process is in the critical section.
    #[error("mutual exclusion violated: {holders:?} hold the critical section")]
    MutualExclusionViolated { holders: Vec<ProcessId> },

    /// The bus did not drain within the delivery budget.
    #[error("no quiescence after {limit} deliveries")]
    DeliveryLimitExceeded { limit: usize },
}
