//! Messages exchanged between processes.

use maekawa_types::{Priority, ProcessId, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The six message kinds of the protocol.
///
/// REQUEST / GRANT / RELEASE carry the basic vote exchange. INQUIRE,
/// RELINQUISH and FAILED let a voter take its vote back from a lower-priority
/// requester so that competing requests cannot deadlock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageKind {
    /// Requester asks a voter for its vote.
    Request,
    /// Voter gives its vote to a requester.
    Grant,
    /// Requester left the critical section; voter may vote again.
    Release,
    /// Voter asks its current grantee to hand the vote back.
    Inquire,
    /// Requester hands an inquired vote back.
    Relinquish,
    /// Voter tells a requester a higher-priority request is ahead of it.
    Failed,
}

impl MessageKind {
    /// All kinds, in declaration order.
    pub const ALL: [MessageKind; 6] = [
        MessageKind::Request,
        MessageKind::Grant,
        MessageKind::Release,
        MessageKind::Inquire,
        MessageKind::Relinquish,
        MessageKind::Failed,
    ];

    /// Get a human-readable name for this message kind.
    pub fn type_name(&self) -> &'static str {
        match self {
            MessageKind::Request => "REQUEST",
            MessageKind::Grant => "GRANT",
            MessageKind::Release => "RELEASE",
            MessageKind::Inquire => "INQUIRE",
            MessageKind::Relinquish => "RELINQUISH",
            MessageKind::Failed => "FAILED",
        }
    }

    /// Check if this message travels from requester to voter.
    pub fn is_to_voter(&self) -> bool {
        matches!(
            self,
            MessageKind::Request | MessageKind::Release | MessageKind::Relinquish
        )
    }

    /// Check if this message travels from voter to requester.
    pub fn is_to_requester(&self) -> bool {
        !self.is_to_voter()
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// A single protocol message.
///
/// `timestamp` always identifies the request the message is about: the new
/// request's stamp for REQUEST, the answered request's stamp for GRANT,
/// INQUIRE and FAILED, and the sender's own request stamp for RELEASE and
/// RELINQUISH. Consumed exactly once by `to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Message {
    pub kind: MessageKind,
    pub from: ProcessId,
    pub to: ProcessId,
    pub timestamp: Timestamp,
}

impl Message {
    /// Create a new message.
    pub fn new(kind: MessageKind, from: ProcessId, to: ProcessId, timestamp: Timestamp) -> Self {
        Self {
            kind,
            from,
            to,
            timestamp,
        }
    }

    /// REQUEST from `from` stamped `timestamp`.
    pub fn request(from: ProcessId, to: ProcessId, timestamp: Timestamp) -> Self {
        Self::new(MessageKind::Request, from, to, timestamp)
    }

    /// GRANT answering the request `(timestamp, to)`.
    pub fn grant(from: ProcessId, to: ProcessId, timestamp: Timestamp) -> Self {
        Self::new(MessageKind::Grant, from, to, timestamp)
    }

    /// RELEASE of the request stamped `timestamp`.
    pub fn release(from: ProcessId, to: ProcessId, timestamp: Timestamp) -> Self {
        Self::new(MessageKind::Release, from, to, timestamp)
    }

    /// INQUIRE about the grant held by request `(timestamp, to)`.
    pub fn inquire(from: ProcessId, to: ProcessId, timestamp: Timestamp) -> Self {
        Self::new(MessageKind::Inquire, from, to, timestamp)
    }

    /// RELINQUISH of the vote granted for request stamped `timestamp`.
    pub fn relinquish(from: ProcessId, to: ProcessId, timestamp: Timestamp) -> Self {
        Self::new(MessageKind::Relinquish, from, to, timestamp)
    }

    /// FAILED for request `(timestamp, to)`.
    pub fn failed(from: ProcessId, to: ProcessId, timestamp: Timestamp) -> Self {
        Self::new(MessageKind::Failed, from, to, timestamp)
    }

    /// Priority of the request this message concerns.
    pub fn request_priority(&self) -> Priority {
        let requester = if self.kind.is_to_voter() {
            self.from
        } else {
            self.to
        };
        Priority::new(self.timestamp, requester)
    }

    /// Sender/receiver pair, the unit of FIFO ordering.
    pub fn channel(&self) -> (ProcessId, ProcessId) {
        (self.from, self.to)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} -> {} @{}",
            self.kind, self.from, self.to, self.timestamp
        )
    }
}
