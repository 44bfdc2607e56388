//! Requester half of a process.
//!
//! Tracks the current critical-section request: which voters have granted,
//! whether any voter answered FAILED, and which INQUIREs are parked until
//! we know whether to give a vote back.

use maekawa_core::{ProcessState, ProtocolViolation};
use maekawa_messages::Message;
use maekawa_types::{Priority, ProcessId, Quorum, Timestamp};
use std::collections::BTreeSet;
use tracing::{debug, trace};

/// Request bookkeeping of a single process.
#[derive(Debug, Clone)]
pub struct RequesterState {
    /// Process that issues the requests.
    id: ProcessId,

    /// Voters whose grant we need.
    quorum: Quorum,

    /// Critical-section state.
    state: ProcessState,

    /// Current request, while `Wanted` or `Held`.
    request: Option<Priority>,

    /// Voters that currently lend us their vote.
    votes_granted: BTreeSet<ProcessId>,

    /// Whether any voter answered FAILED to the current request.
    failed: bool,

    /// Whether we've relinquished a vote during the current request.
    yielded: bool,

    /// Voters that INQUIREd while we had no reason yet to give the vote back.
    deferred_inquiries: BTreeSet<ProcessId>,
}

impl RequesterState {
    /// Create an idle requester.
    pub fn new(id: ProcessId, quorum: Quorum) -> Self {
        Self {
            id,
            quorum,
            state: ProcessState::Released,
            request: None,
            votes_granted: BTreeSet::new(),
            failed: false,
            yielded: false,
            deferred_inquiries: BTreeSet::new(),
        }
    }

    /// Critical-section state.
    pub fn state(&self) -> ProcessState {
        self.state
    }

    /// Voters whose grant we need.
    pub fn quorum(&self) -> &Quorum {
        &self.quorum
    }

    /// Current request, while `Wanted` or `Held`.
    pub fn request(&self) -> Option<Priority> {
        self.request
    }

    /// Voters that currently lend us their vote.
    pub fn votes_granted(&self) -> &BTreeSet<ProcessId> {
        &self.votes_granted
    }

    /// Voters whose INQUIRE is parked.
    pub fn deferred_inquiries(&self) -> &BTreeSet<ProcessId> {
        &self.deferred_inquiries
    }

    /// Start a request stamped `timestamp`.
    ///
    /// Returns the REQUESTs to send and whether the critical section was
    /// entered straight away (empty quorum).
    pub fn request_cs(
        &mut self,
        timestamp: Timestamp,
    ) -> Result<(Vec<Message>, bool), ProtocolViolation> {
        if self.state != ProcessState::Released {
            return Err(ProtocolViolation::NotReleased {
                id: self.id,
                state: self.state,
            });
        }

        self.request = Some(Priority::new(timestamp, self.id));
        self.state = ProcessState::Wanted;
        self.reset_votes();

        let requests = self
            .quorum
            .iter()
            .map(|voter| Message::request(self.id, voter, timestamp))
            .collect();

        Ok((requests, self.try_enter()))
    }

    /// Leave the critical section.
    ///
    /// Returns the RELEASEs to send.
    pub fn release_cs(&mut self) -> Result<Vec<Message>, ProtocolViolation> {
        let request = match (self.state, self.request) {
            (ProcessState::Held, Some(request)) => request,
            _ => {
                return Err(ProtocolViolation::NotHeld {
                    id: self.id,
                    state: self.state,
                })
            }
        };

        self.state = ProcessState::Released;
        self.request = None;
        self.reset_votes();

        Ok(self
            .quorum
            .iter()
            .map(|voter| Message::release(self.id, voter, request.timestamp))
            .collect())
    }

    /// Handle a GRANT.
    ///
    /// Returns true if this grant completed the quorum and we entered the
    /// critical section.
    pub fn on_grant(&mut self, msg: &Message) -> Result<bool, ProtocolViolation> {
        if !self.is_current(msg.timestamp) || !self.quorum.contains(msg.from) {
            return Err(ProtocolViolation::UnexpectedGrant {
                id: self.id,
                state: self.state,
                message: *msg,
            });
        }

        self.votes_granted.insert(msg.from);
        trace!(
            requester = %self.id,
            voter = %msg.from,
            granted = self.votes_granted.len(),
            needed = self.quorum.len(),
            "Vote granted"
        );

        Ok(self.try_enter())
    }

    /// Handle an INQUIRE.
    ///
    /// Gives the vote back right away if this request is already known to be
    /// losing; otherwise parks the inquiry until a FAILED arrives. Stale
    /// inquiries and inquiries while `Held` are ignored: our RELEASE answers them.
    pub fn on_inquire(&mut self, msg: &Message) -> Vec<Message> {
        if !self.is_current(msg.timestamp) || !self.votes_granted.contains(&msg.from) {
            trace!(
                requester = %self.id,
                voter = %msg.from,
                state = %self.state,
                "Ignoring inquire"
            );
            return vec![];
        }

        if self.failed || self.yielded {
            return self.relinquish([msg.from]);
        }

        self.deferred_inquiries.insert(msg.from);
        vec![]
    }

    /// Handle a FAILED.
    ///
    /// Marks the request as losing and gives back every parked vote.
    pub fn on_failed(&mut self, msg: &Message) -> Vec<Message> {
        if !self.is_current(msg.timestamp) {
            trace!(requester = %self.id, voter = %msg.from, "Ignoring stale failed");
            return vec![];
        }

        self.failed = true;
        let parked = std::mem::take(&mut self.deferred_inquiries);
        self.relinquish(parked)
    }

    fn relinquish(&mut self, voters: impl IntoIterator<Item = ProcessId>) -> Vec<Message> {
        let Some(request) = self.request else {
            return vec![];
        };

        let mut out = Vec::new();
        for voter in voters {
            if self.votes_granted.remove(&voter) {
                debug!(requester = %self.id, voter = %voter, "Relinquishing vote");
                self.yielded = true;
                out.push(Message::relinquish(self.id, voter, request.timestamp));
            }
        }
        out
    }

    /// Whether `timestamp` belongs to the request we are still collecting votes for.
    fn is_current(&self, timestamp: Timestamp) -> bool {
        self.state == ProcessState::Wanted
            && self.request.is_some_and(|r| r.timestamp == timestamp)
    }

    fn try_enter(&mut self) -> bool {
        if self.state != ProcessState::Wanted || !self.quorum.is_covered_by(&self.votes_granted) {
            return false;
        }
        self.state = ProcessState::Held;
        self.deferred_inquiries.clear();
        true
    }

    fn reset_votes(&mut self) {
        self.votes_granted.clear();
        self.deferred_inquiries.clear();
        self.failed = false;
        self.yielded = false;
    }
}
