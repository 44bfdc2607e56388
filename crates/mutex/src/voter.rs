//! Voter half of a process.
//!
//! A voter owns one vote. It lends it to the highest-priority request it
//! knows of and queues everyone else. When a request arrives that outranks
//! the current grantee, the voter INQUIREs so the vote can come back.

use maekawa_messages::Message;
use maekawa_types::{Priority, ProcessId};
use std::collections::BTreeSet;
use tracing::{debug, trace};

/// Vote bookkeeping of a single process.
#[derive(Debug, Clone)]
pub struct VoterState {
    /// Process that owns this vote.
    id: ProcessId,

    /// Request currently holding our vote.
    voting_for: Option<Priority>,

    /// Requests waiting for our vote, highest priority first.
    deferred: BTreeSet<Priority>,

    /// Whether we've sent INQUIRE to the current grantee.
    inquired: bool,
}

impl VoterState {
    /// Create an idle voter.
    pub fn new(id: ProcessId) -> Self {
        Self {
            id,
            voting_for: None,
            deferred: BTreeSet::new(),
            inquired: false,
        }
    }

    /// Request currently holding our vote.
    pub fn voting_for(&self) -> Option<Priority> {
        self.voting_for
    }

    /// Requests queued behind the current grantee, highest priority first.
    pub fn deferred(&self) -> impl Iterator<Item = Priority> + '_ {
        self.deferred.iter().copied()
    }

    /// Whether an INQUIRE is outstanding for the current grantee.
    pub fn has_inquired(&self) -> bool {
        self.inquired
    }

    /// Handle a REQUEST.
    ///
    /// Grants if the vote is free. Otherwise queues the request and either
    /// INQUIREs the current grantee (the newcomer outranks everyone) or tells
    /// the newcomer it FAILED.
    pub fn on_request(&mut self, request: Priority) -> Vec<Message> {
        let Some(locked) = self.voting_for else {
            return vec![self.grant(request)];
        };

        let previous_head = self.deferred.first().copied();
        self.deferred.insert(request);

        if !request.outranks(&locked) || previous_head.is_some_and(|h| h.outranks(&request)) {
            trace!(
                voter = %self.id,
                request = %request,
                locked = %locked,
                "Request behind higher priority, replying FAILED"
            );
            return vec![Message::failed(self.id, request.process, request.timestamp)];
        }

        let mut out = Vec::new();

        // The old head is no longer next in line
        if let Some(head) = previous_head.filter(|h| h.outranks(&locked)) {
            out.push(Message::failed(self.id, head.process, head.timestamp));
        }

        if !self.inquired {
            self.inquired = true;
            debug!(
                voter = %self.id,
                grantee = %locked,
                challenger = %request,
                "Inquiring grantee on behalf of higher priority request"
            );
            out.push(Message::inquire(self.id, locked.process, locked.timestamp));
        }

        out
    }

    /// Handle a RELEASE from the grantee.
    ///
    /// Frees the vote and passes it to the next queued request, if any.
    pub fn on_release(&mut self, released: Priority) -> Vec<Message> {
        if self.voting_for != Some(released) {
            debug!(
                voter = %self.id,
                released = %released,
                voting_for = ?self.voting_for,
                "Ignoring release from a request we are not voting for"
            );
            return vec![];
        }

        self.voting_for = None;
        self.inquired = false;
        self.grant_next()
    }

    /// Handle a RELINQUISH from the grantee.
    ///
    /// The relinquished request goes back in the queue and the vote moves to
    /// the highest-priority request now waiting.
    pub fn on_relinquish(&mut self, relinquished: Priority) -> Vec<Message> {
        if self.voting_for != Some(relinquished) {
            debug!(
                voter = %self.id,
                relinquished = %relinquished,
                voting_for = ?self.voting_for,
                "Ignoring stale relinquish"
            );
            return vec![];
        }

        self.voting_for = None;
        self.inquired = false;
        self.deferred.insert(relinquished);
        self.grant_next()
    }

    fn grant_next(&mut self) -> Vec<Message> {
        match self.deferred.pop_first() {
            Some(next) => vec![self.grant(next)],
            None => vec![],
        }
    }

    fn grant(&mut self, request: Priority) -> Message {
        debug!(voter = %self.id, grantee = %request, "Granting vote");
        self.voting_for = Some(request);
        self.inquired = false;
        Message::grant(self.id, request.process, request.timestamp)
    }
}
