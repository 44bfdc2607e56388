//! Cluster errors.

use maekawa_core::ProtocolViolation;
use maekawa_messages::Message;
use maekawa_types::ProcessId;
use std::time::Duration;
use thiserror::Error;

/// Failures of a [`TaskCluster`](crate::TaskCluster).
///
/// Errors raised inside a process task are recorded and reported by the
/// next [`wait_quiescent`](crate::TaskCluster::wait_quiescent).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClusterError {
    #[error("no process {0} in the cluster")]
    UnknownProcess(ProcessId),

    #[error("cannot route {0}")]
    Unroutable(Message),

    #[error("protocol violation: {0}")]
    Protocol(#[from] ProtocolViolation),

    #[error("mutual exclusion violated: {holders} processes in the critical section")]
    MutualExclusionViolated { holders: usize },

    #[error("cluster did not quiesce within {0:?}")]
    Timeout(Duration),

    #[error("process task {0} has stopped")]
    Stopped(ProcessId),
}
