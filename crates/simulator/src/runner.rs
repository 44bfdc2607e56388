//! The iteration driver.

use crate::{
    IterationReport, Outcome, RequestPolicy, SimulationReport, SimulatorConfig, SimulatorError,
};
use maekawa_core::ProcessState;
use maekawa_messages::Message;
use maekawa_simulation::{SimulationRunner, TraceEvent};
use maekawa_types::{ProcessId, QuorumSystem};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use std::collections::BTreeSet;
use std::io::Write;
use tracing::{debug, info, warn};

/// Drives a [`SimulationRunner`] through a fixed number of iterations.
///
/// Each iteration:
/// 1. the policy picks the requesters, each of which calls `RequestCS`
/// 2. the bus is drained to quiescence
/// 3. every process in `Held` is released, and the bus drained again
/// 4. step 3 repeats until nobody new enters
///
/// Requesters that entered are reported as granted, the rest as blocked.
pub struct Simulator {
    config: SimulatorConfig,
    quorums: QuorumSystem,
    policy: Box<dyn RequestPolicy>,
    rng: ChaCha8Rng,
    runner: SimulationRunner,
    seed: u64,
}

impl Simulator {
    /// Create a simulator using the configured request policy.
    pub fn new(config: SimulatorConfig) -> Result<Self, SimulatorError> {
        let policy = config.request_policy.build(config.process_count);
        Self::with_policy(config, policy)
    }

    /// Create a simulator with a custom request policy.
    pub fn with_policy(
        config: SimulatorConfig,
        policy: Box<dyn RequestPolicy>,
    ) -> Result<Self, SimulatorError> {
        config.validate()?;
        let quorums = config.quorum_system()?;
        let seed = config.seed.unwrap_or_else(rand::random);

        // Policy draws use their own stream so they never shift delivery order.
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        rng.set_stream(1);

        let runner = SimulationRunner::new(&quorums, config.to_runner_config(seed));

        Ok(Self {
            config,
            quorums,
            policy,
            rng,
            runner,
            seed,
        })
    }

    /// Seed in use, drawn at construction if the config had none.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    pub fn quorums(&self) -> &QuorumSystem {
        &self.quorums
    }

    /// The underlying runner, for inspecting process state between runs.
    pub fn runner(&self) -> &SimulationRunner {
        &self.runner
    }

    /// Run every iteration.
    pub fn run(&mut self) -> Result<SimulationReport, SimulatorError> {
        self.run_with(|_| {})
    }

    /// Run every iteration, handing each trace event to `observe` as its
    /// iteration finishes.
    ///
    /// Events of an iteration that aborts are still observed before the
    /// error is returned.
    pub fn run_with(
        &mut self,
        mut observe: impl FnMut(&TraceEvent),
    ) -> Result<SimulationReport, SimulatorError> {
        info!(
            processes = self.config.process_count,
            iterations = self.config.iteration_count,
            policy = %self.config.request_policy,
            contenders = self.config.contenders,
            layout = %self.config.layout,
            delivery = %self.config.delivery,
            seed = self.seed,
            "Starting simulation"
        );

        let mut report = SimulationReport::new(self.seed);
        for iteration in 0..self.config.iteration_count {
            let result = self.run_iteration(iteration);
            for event in self.runner.take_trace() {
                observe(&event);
            }
            report.iterations.extend(result?);
        }
        report.stats = self.runner.stats().clone();

        info!(
            granted = report.grants(),
            blocked = report.blocks(),
            messages = report.stats.total_sent(),
            "Simulation complete"
        );
        Ok(report)
    }

    /// Run every iteration, writing each trace event to `out` as one line of
    /// JSON, followed by a final line with the run summary.
    ///
    /// The first encode or write failure is returned once the run ends; no
    /// event is skipped silently.
    pub fn run_json_lines(
        &mut self,
        out: &mut impl Write,
    ) -> Result<SimulationReport, SimulatorError> {
        let mut failure: Option<SimulatorError> = None;
        let report = self.run_with(|event| {
            if failure.is_some() {
                return;
            }
            if let Err(err) = write_json_line(&mut *out, event) {
                failure = Some(err);
            }
        })?;
        if let Some(err) = failure {
            return Err(err);
        }
        write_json_line(out, &report.summary())?;
        Ok(report)
    }

    fn run_iteration(&mut self, iteration: u64) -> Result<Vec<IterationReport>, SimulatorError> {
        self.runner.set_iteration(iteration);
        let requesters = self
            .policy
            .next_requesters(self.config.contenders, &mut self.rng);
        debug!(iteration, ?requesters, "Starting iteration");

        for &id in &requesters {
            if self.runner.state(id) == Some(ProcessState::Wanted) {
                debug!(iteration, process = %id, "Still waiting on an earlier request");
                continue;
            }
            self.runner.request(id)?;
        }

        let mut entered = BTreeSet::new();
        loop {
            self.runner.run_until_quiescent()?;
            let holders = self.runner.processes_in(ProcessState::Held);
            if holders.is_empty() {
                break;
            }
            for id in holders {
                entered.insert(id);
                self.runner.release(id)?;
            }
        }

        let reports = requesters
            .into_iter()
            .map(|requester| {
                let outcome = if entered.contains(&requester) {
                    Outcome::Granted
                } else {
                    warn!(iteration, process = %requester, "Requester blocked");
                    Outcome::Blocked
                };
                IterationReport {
                    iteration,
                    requester,
                    outcome,
                    messages: self.exchanged(iteration, requester),
                }
            })
            .collect();
        Ok(reports)
    }

    /// Delivered messages of an iteration that involve `process`.
    fn exchanged(&self, iteration: u64, process: ProcessId) -> Vec<Message> {
        self.runner
            .trace()
            .iter()
            .filter_map(|event| match event {
                TraceEvent::Delivered { message, .. } if event.iteration() == iteration => {
                    Some(*message)
                }
                _ => None,
            })
            .filter(|m| m.from == process || m.to == process)
            .collect()
    }
}

fn write_json_line(out: &mut impl Write, value: &impl Serialize) -> Result<(), SimulatorError> {
    let line = serde_json::to_string(value)?;
    writeln!(out, "{}", line)?;
    Ok(())
}
