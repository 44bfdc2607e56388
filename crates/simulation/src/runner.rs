//! The deterministic simulation runner.

use crate::{DeliveryOrder, MessageBus, SimulationError, TraceEvent};
use maekawa_core::{Action, Event, ProcessState, StateMachine};
use maekawa_messages::MessageKind;
use maekawa_mutex::ProcessStateMachine;
use maekawa_types::{ProcessId, QuorumSystem};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, trace};

/// Knobs of a single runner.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Seed for every random choice the runner makes.
    pub seed: u64,

    /// How the bus picks the next channel.
    pub delivery: DeliveryOrder,

    /// Deliveries allowed per call to `run_until_quiescent`.
    pub max_deliveries: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            seed: 12345,
            delivery: DeliveryOrder::Fifo,
            max_deliveries: 100_000,
        }
    }
}

impl RunnerConfig {
    /// Set the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the delivery order.
    pub fn with_delivery(mut self, delivery: DeliveryOrder) -> Self {
        self.delivery = delivery;
        self
    }

    /// Set the delivery budget.
    pub fn with_max_deliveries(mut self, max_deliveries: usize) -> Self {
        self.max_deliveries = max_deliveries;
        self
    }
}

/// Counters collected over a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SimulationStats {
    /// Messages sent, by kind.
    pub messages_sent: BTreeMap<MessageKind, u64>,

    /// Messages delivered.
    pub messages_delivered: u64,

    /// Critical-section entries.
    pub cs_entries: u64,

    /// Highest number of simultaneous holders observed. Never above 1 in a
    /// run that did not abort.
    pub max_concurrent_holders: usize,
}

impl SimulationStats {
    /// Total messages sent across all kinds.
    pub fn total_sent(&self) -> u64 {
        self.messages_sent.values().sum()
    }

    /// Messages sent of one kind.
    pub fn sent(&self, kind: MessageKind) -> u64 {
        self.messages_sent.get(&kind).copied().unwrap_or(0)
    }
}

/// Owns every process and the bus, and drives delivery.
///
/// Processes are only reachable through events: the driver injects
/// `RequestCs` / `ReleaseCs`, the bus injects `MessageReceived`.
pub struct SimulationRunner {
    processes: Vec<ProcessStateMachine>,
    bus: MessageBus,
    rng: ChaCha8Rng,
    max_deliveries: usize,
    iteration: u64,
    trace: Vec<TraceEvent>,
    stats: SimulationStats,
}

impl SimulationRunner {
    /// Create a runner with one released process per quorum.
    pub fn new(quorums: &QuorumSystem, config: RunnerConfig) -> Self {
        let processes = quorums
            .iter()
            .map(|(id, quorum)| ProcessStateMachine::new(id, quorum.clone()))
            .collect();

        debug!(
            processes = quorums.len(),
            seed = config.seed,
            delivery = %config.delivery,
            "Created simulation runner"
        );

        Self {
            processes,
            bus: MessageBus::new(quorums.len(), config.delivery),
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            max_deliveries: config.max_deliveries,
            iteration: 0,
            trace: Vec::new(),
            stats: SimulationStats::default(),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Driver API
    // ═══════════════════════════════════════════════════════════════════════

    /// Tag subsequent trace events with this iteration index.
    pub fn set_iteration(&mut self, iteration: u64) {
        self.iteration = iteration;
    }

    /// Ask a process to request the critical section.
    pub fn request(&mut self, id: ProcessId) -> Result<(), SimulationError> {
        self.apply(id, Event::RequestCs)
    }

    /// Ask a process to leave the critical section.
    pub fn release(&mut self, id: ProcessId) -> Result<(), SimulationError> {
        self.apply(id, Event::ReleaseCs)
    }

    /// Deliver messages until the bus is empty.
    ///
    /// Returns the number of deliveries made. Fails if a handler breaks the
    /// protocol, if exclusion is violated, or if the budget runs out.
    pub fn run_until_quiescent(&mut self) -> Result<usize, SimulationError> {
        let mut delivered = 0;
        while !self.bus.is_quiescent() {
            // Checked before popping so the undelivered message stays queued
            if delivered == self.max_deliveries {
                return Err(SimulationError::DeliveryLimitExceeded {
                    limit: self.max_deliveries,
                });
            }
            let Some(msg) = self.bus.next(&mut self.rng) else {
                break;
            };
            delivered += 1;
            self.stats.messages_delivered += 1;
            trace!(message = %msg, "Delivering");
            self.trace.push(TraceEvent::Delivered {
                iteration: self.iteration,
                message: msg,
            });
            self.apply(msg.to, Event::MessageReceived(msg))?;
        }
        Ok(delivered)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Queries
    // ═══════════════════════════════════════════════════════════════════════

    /// State of a process.
    pub fn state(&self, id: ProcessId) -> Option<ProcessState> {
        self.process(id).map(|p| p.state())
    }

    /// Read-only view of a process.
    pub fn process(&self, id: ProcessId) -> Option<&ProcessStateMachine> {
        self.processes.get(id.index())
    }

    /// All processes in id order.
    pub fn processes(&self) -> &[ProcessStateMachine] {
        &self.processes
    }

    /// Processes currently in a given state.
    pub fn processes_in(&self, state: ProcessState) -> Vec<ProcessId> {
        self.processes
            .iter()
            .filter(|p| p.state() == state)
            .map(|p| p.id())
            .collect()
    }

    /// Undelivered messages.
    pub fn pending_messages(&self) -> usize {
        self.bus.pending()
    }

    /// Everything recorded so far.
    pub fn trace(&self) -> &[TraceEvent] {
        &self.trace
    }

    /// Take the recorded trace, leaving it empty.
    pub fn take_trace(&mut self) -> Vec<TraceEvent> {
        std::mem::take(&mut self.trace)
    }

    /// Counters so far.
    pub fn stats(&self) -> &SimulationStats {
        &self.stats
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Internals
    // ═══════════════════════════════════════════════════════════════════════

    fn apply(&mut self, id: ProcessId, event: Event) -> Result<(), SimulationError> {
        let process = self
            .processes
            .get_mut(id.index())
            .ok_or(SimulationError::UnknownProcess(id))?;

        let before = process.state();
        let actions = process.handle(event)?;
        let after = process.state();

        if before != after {
            self.trace.push(TraceEvent::StateChanged {
                iteration: self.iteration,
                process: id,
                from: before,
                to: after,
            });
            self.check_exclusion()?;
        }

        for action in actions {
            match action {
                Action::Send(msg) => {
                    self.bus.send(msg)?;
                    *self.stats.messages_sent.entry(msg.kind).or_insert(0) += 1;
                    self.trace.push(TraceEvent::Sent {
                        iteration: self.iteration,
                        message: msg,
                    });
                }
                Action::EnteredCriticalSection { .. } => {
                    self.stats.cs_entries += 1;
                }
                Action::ExitedCriticalSection { .. } => {}
            }
        }
        Ok(())
    }

    fn check_exclusion(&mut self) -> Result<(), SimulationError> {
        let holders = self.processes_in(ProcessState::Held);
        self.stats.max_concurrent_holders = self.stats.max_concurrent_holders.max(holders.len());
        if holders.len() > 1 {
            return Err(SimulationError::MutualExclusionViolated { holders });
        }
        Ok(())
    }
}
