//! Test helpers for Maekawa.
//!
//! Replays a recorded [`TraceEvent`] log and checks the properties every run
//! must satisfy, whatever the delivery order:
//!
//! - [`check_fifo`]: per-channel delivery follows send order
//! - [`check_mutual_exclusion`]: never two holders at once
//! - [`check_vote_conservation`]: entry only with a REQUEST sent to, and a
//!   live GRANT from, every quorum member
//!
//! Each checker returns a description of the first offending event.

use maekawa_core::ProcessState;
use maekawa_messages::{Message, MessageKind};
use maekawa_simulation::TraceEvent;
use maekawa_types::{ProcessId, QuorumBuilder, QuorumLayout, QuorumSystem, Timestamp};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Quorums `{(i+1)%n, ..., (i+span)%n}`, unchecked.
pub fn ring_quorums(n: usize, span: u32) -> QuorumSystem {
    QuorumBuilder::new(n)
        .layout(QuorumLayout::Ring { span })
        .build()
        .expect("valid ring layout")
}

/// Quorums of every other process, checked for intersection.
pub fn all_others_quorums(n: usize) -> QuorumSystem {
    QuorumBuilder::new(n)
        .layout(QuorumLayout::AllOthers)
        .build()
        .expect("intersecting all-others layout")
}

/// Messages of one kind that were sent, in trace order.
pub fn sent(trace: &[TraceEvent], kind: MessageKind) -> Vec<Message> {
    trace
        .iter()
        .filter_map(|e| match e {
            TraceEvent::Sent { message, .. } if message.kind == kind => Some(*message),
            _ => None,
        })
        .collect()
}

/// Messages of one kind that were delivered, in trace order.
pub fn delivered(trace: &[TraceEvent], kind: MessageKind) -> Vec<Message> {
    trace
        .iter()
        .filter_map(|e| match e {
            TraceEvent::Delivered { message, .. } if message.kind == kind => Some(*message),
            _ => None,
        })
        .collect()
}

/// Order in which processes entered the critical section.
pub fn entries(trace: &[TraceEvent]) -> Vec<ProcessId> {
    trace
        .iter()
        .filter_map(|e| match e {
            TraceEvent::StateChanged {
                process,
                to: ProcessState::Held,
                ..
            } => Some(*process),
            _ => None,
        })
        .collect()
}

/// Every delivery on a channel must be the oldest undelivered send on it.
pub fn check_fifo(trace: &[TraceEvent]) -> Result<(), String> {
    let mut in_flight: BTreeMap<(ProcessId, ProcessId), VecDeque<Message>> = BTreeMap::new();

    for (index, event) in trace.iter().enumerate() {
        match event {
            TraceEvent::Sent { message, .. } => {
                in_flight
                    .entry(message.channel())
                    .or_default()
                    .push_back(*message);
            }
            TraceEvent::Delivered { message, .. } => {
                let expected = in_flight
                    .get_mut(&message.channel())
                    .and_then(VecDeque::pop_front);
                if expected != Some(*message) {
                    return Err(format!(
                        "event {}: delivered {} but channel head was {:?}",
                        index, message, expected
                    ));
                }
            }
            TraceEvent::StateChanged { .. } => {}
        }
    }
    Ok(())
}

/// At most one process is `Held` after every state change.
pub fn check_mutual_exclusion(trace: &[TraceEvent]) -> Result<(), String> {
    let mut holders = BTreeSet::new();

    for (index, event) in trace.iter().enumerate() {
        if let TraceEvent::StateChanged {
            process, from, to, ..
        } = event
        {
            if *from == ProcessState::Held {
                holders.remove(process);
            }
            if *to == ProcessState::Held {
                holders.insert(*process);
            }
            if holders.len() > 1 {
                return Err(format!("event {}: {:?} hold together", index, holders));
            }
        }
    }
    Ok(())
}

#[derive(Default)]
struct Tally {
    timestamp: Option<Timestamp>,
    requested: BTreeSet<ProcessId>,
    granted: BTreeSet<ProcessId>,
}

/// Every entry is backed by a REQUEST to, and an unreturned GRANT from, the whole quorum.
pub fn check_vote_conservation(trace: &[TraceEvent], quorums: &QuorumSystem) -> Result<(), String> {
    let mut tallies: BTreeMap<ProcessId, Tally> = BTreeMap::new();

    for (index, event) in trace.iter().enumerate() {
        match event {
            TraceEvent::StateChanged {
                process, from, to, ..
            } => {
                let tally = tallies.entry(*process).or_default();
                match (from, to) {
                    (ProcessState::Released, _) | (ProcessState::Held, _) => {
                        *tally = Tally::default();
                    }
                    _ => {}
                }
                if *to == ProcessState::Held {
                    let quorum = quorums
                        .quorum(*process)
                        .ok_or_else(|| format!("event {}: unknown process {}", index, process))?;
                    if !quorum.is_covered_by(&tally.requested) {
                        return Err(format!(
                            "event {}: {} entered without requesting from its whole quorum",
                            index, process
                        ));
                    }
                    if !quorum.is_covered_by(&tally.granted) {
                        return Err(format!(
                            "event {}: {} entered with votes {:?} for quorum {:?}",
                            index,
                            process,
                            tally.granted,
                            quorum.members()
                        ));
                    }
                }
            }
            TraceEvent::Sent { message, .. } => {
                let tally = tallies.entry(message.from).or_default();
                match message.kind {
                    MessageKind::Request => {
                        tally.timestamp = Some(message.timestamp);
                        tally.requested.insert(message.to);
                    }
                    MessageKind::Relinquish => {
                        tally.granted.remove(&message.to);
                    }
                    _ => {}
                }
            }
            TraceEvent::Delivered { message, .. } if message.kind == MessageKind::Grant => {
                let tally = tallies.entry(message.to).or_default();
                if tally.timestamp == Some(message.timestamp) {
                    tally.granted.insert(message.from);
                }
            }
            TraceEvent::Delivered { .. } => {}
        }
    }
    Ok(())
}
