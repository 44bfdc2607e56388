//! The combined per-process state machine.

use crate::{RequesterState, VoterState};
use maekawa_core::{Action, Event, ProcessState, ProtocolViolation, StateMachine};
use maekawa_messages::{Message, MessageKind};
use maekawa_types::{Priority, ProcessId, Quorum, Timestamp};
use std::collections::BTreeSet;
use tracing::{debug, info};

/// One participant in the protocol.
///
/// Owns a Lamport clock plus a requester and a voter. Mutated only through
/// [`StateMachine::handle`]; peers are reached exclusively through
/// `Action::Send`.
#[derive(Debug, Clone)]
pub struct ProcessStateMachine {
    id: ProcessId,
    clock: Timestamp,
    requester: RequesterState,
    voter: VoterState,
}

impl ProcessStateMachine {
    /// Create a released process with the given quorum.
    pub fn new(id: ProcessId, quorum: Quorum) -> Self {
        Self {
            id,
            clock: Timestamp::ZERO,
            requester: RequesterState::new(id, quorum),
            voter: VoterState::new(id),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Accessors
    // ═══════════════════════════════════════════════════════════════════════

    /// Current Lamport clock.
    pub fn clock(&self) -> Timestamp {
        self.clock
    }

    /// Voters this process needs.
    pub fn quorum(&self) -> &Quorum {
        self.requester.quorum()
    }

    /// Current request, while `Wanted` or `Held`.
    pub fn request(&self) -> Option<Priority> {
        self.requester.request()
    }

    /// Voters currently lending their vote to us.
    pub fn votes_granted(&self) -> &BTreeSet<ProcessId> {
        self.requester.votes_granted()
    }

    /// Request our own vote is lent to.
    pub fn voting_for(&self) -> Option<Priority> {
        self.voter.voting_for()
    }

    /// Requests queued for our vote, highest priority first.
    pub fn deferred_requests(&self) -> Vec<Priority> {
        self.voter.deferred().collect()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Handlers
    // ═══════════════════════════════════════════════════════════════════════

    fn request_cs(&mut self) -> Result<Vec<Action>, ProtocolViolation> {
        let timestamp = self.clock.next();
        let (requests, entered) = self.requester.request_cs(timestamp)?;
        self.clock = timestamp;

        debug!(
            id = %self.id,
            timestamp = %timestamp,
            quorum_size = self.quorum().len(),
            "Requesting critical section"
        );

        let mut actions: Vec<Action> = requests.into_iter().map(Action::Send).collect();
        if entered {
            actions.push(self.entered(timestamp));
        }
        Ok(actions)
    }

    fn release_cs(&mut self) -> Result<Vec<Action>, ProtocolViolation> {
        let releases = self.requester.release_cs()?;

        info!(id = %self.id, "Released critical section");

        let mut actions: Vec<Action> = releases.into_iter().map(Action::Send).collect();
        actions.push(Action::ExitedCriticalSection { id: self.id });
        Ok(actions)
    }

    fn on_message(&mut self, msg: Message) -> Result<Vec<Action>, ProtocolViolation> {
        if msg.to != self.id {
            return Err(ProtocolViolation::ForeignMessage {
                id: self.id,
                message: msg,
            });
        }

        let priority = msg.request_priority();
        let mut actions = Vec::new();
        let outgoing = match msg.kind {
            MessageKind::Request => self.voter.on_request(priority),
            MessageKind::Release => self.voter.on_release(priority),
            MessageKind::Relinquish => self.voter.on_relinquish(priority),
            MessageKind::Inquire => self.requester.on_inquire(&msg),
            MessageKind::Failed => self.requester.on_failed(&msg),
            MessageKind::Grant => {
                if self.requester.on_grant(&msg)? {
                    actions.push(self.entered(msg.timestamp));
                }
                vec![]
            }
        };

        // Merged only once the handler accepted the message
        self.clock = self.clock.merge(msg.timestamp);

        let mut sends: Vec<Action> = outgoing.into_iter().map(Action::Send).collect();
        sends.append(&mut actions);
        Ok(sends)
    }

    fn entered(&self, timestamp: Timestamp) -> Action {
        info!(
            id = %self.id,
            timestamp = %timestamp,
            votes = self.votes_granted().len(),
            "Entered critical section"
        );
        Action::EnteredCriticalSection {
            id: self.id,
            timestamp,
        }
    }
}

impl StateMachine for ProcessStateMachine {
    fn handle(&mut self, event: Event) -> Result<Vec<Action>, ProtocolViolation> {
        match event {
            Event::RequestCs => self.request_cs(),
            Event::ReleaseCs => self.release_cs(),
            Event::MessageReceived(msg) => self.on_message(msg),
        }
    }

    fn id(&self) -> ProcessId {
        self.id
    }

    fn state(&self) -> ProcessState {
        self.requester.state()
    }
}
