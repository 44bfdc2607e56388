//! Per-iteration outcomes and run summary.

use colored::Colorize;
use maekawa_messages::{Message, MessageKind};
use maekawa_simulation::SimulationStats;
use maekawa_types::ProcessId;
use serde::Serialize;

/// What became of one requester in one iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Entered and left the critical section.
    Granted,

    /// Still waiting for votes when the iteration ran out of progress.
    Blocked,
}

/// One requester's view of one iteration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IterationReport {
    pub iteration: u64,
    pub requester: ProcessId,
    pub outcome: Outcome,
    /// Delivered messages sent by or to the requester, in delivery order.
    pub messages: Vec<Message>,
}

/// Everything a run produced.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    /// Seed the run used; rerunning with it reproduces the report.
    pub seed: u64,

    pub iterations: Vec<IterationReport>,

    pub stats: SimulationStats,
}

/// Counts of a [`SimulationReport`], without the per-iteration detail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimulationSummary {
    pub seed: u64,
    pub iterations: u64,
    pub granted: usize,
    pub blocked: usize,
    pub messages_sent: u64,
    pub messages_delivered: u64,
    pub cs_entries: u64,
}

impl SimulationReport {
    pub(crate) fn new(seed: u64) -> Self {
        Self {
            seed,
            iterations: Vec::new(),
            stats: SimulationStats::default(),
        }
    }

    /// Requests that were granted.
    pub fn grants(&self) -> usize {
        self.count(Outcome::Granted)
    }

    /// Requests still blocked at the end of their iteration.
    pub fn blocks(&self) -> usize {
        self.count(Outcome::Blocked)
    }

    fn count(&self, outcome: Outcome) -> usize {
        self.iterations.iter().filter(|r| r.outcome == outcome).count()
    }

    /// Reports of blocked requesters.
    pub fn blocked(&self) -> impl Iterator<Item = &IterationReport> {
        self.iterations
            .iter()
            .filter(|r| r.outcome == Outcome::Blocked)
    }

    /// Reports of one iteration.
    pub fn iteration(&self, iteration: u64) -> impl Iterator<Item = &IterationReport> {
        self.iterations
            .iter()
            .filter(move |r| r.iteration == iteration)
    }

    pub fn summary(&self) -> SimulationSummary {
        SimulationSummary {
            seed: self.seed,
            iterations: self
                .iterations
                .last()
                .map(|r| r.iteration + 1)
                .unwrap_or(0),
            granted: self.grants(),
            blocked: self.blocks(),
            messages_sent: self.stats.total_sent(),
            messages_delivered: self.stats.messages_delivered,
            cs_entries: self.stats.cs_entries,
        }
    }

    /// Print a human-readable summary to stdout.
    pub fn print(&self) {
        let summary = self.summary();
        println!();
        println!("{}", "-------------------".purple());
        println!("{}", "Summary".purple());
        println!("{}", "-------------------".purple());
        println!("Iterations:         {}", summary.iterations);
        println!("Granted:            {}", summary.granted.to_string().green());
        if summary.blocked > 0 {
            println!("Blocked:            {}", summary.blocked.to_string().red());
            for report in self.blocked() {
                println!(
                    "  iteration {}: {} never collected its quorum",
                    report.iteration + 1,
                    report.requester
                );
            }
        } else {
            println!("Blocked:            0");
        }
        println!("CS entries:         {}", summary.cs_entries);
        println!("Messages sent:      {}", summary.messages_sent);
        for kind in MessageKind::ALL {
            let sent = self.stats.sent(kind);
            if sent > 0 {
                println!("  {:<16}  {}", kind.to_string(), sent);
            }
        }
        println!("Messages delivered: {}", summary.messages_delivered);
        println!("Seed:               {}", summary.seed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maekawa_types::Timestamp;

    fn report(iteration: u64, requester: u32, outcome: Outcome) -> IterationReport {
        IterationReport {
            iteration,
            requester: ProcessId(requester),
            outcome,
            messages: vec![Message::request(
                ProcessId(requester),
                ProcessId(0),
                Timestamp(1),
            )],
        }
    }

    #[test]
    fn test_summary_counts() {
        let mut sim = SimulationReport::new(42);
        sim.iterations.push(report(0, 1, Outcome::Granted));
        sim.iterations.push(report(1, 2, Outcome::Granted));
        sim.iterations.push(report(1, 3, Outcome::Blocked));
        sim.stats.messages_sent.insert(MessageKind::Request, 6);
        sim.stats.messages_sent.insert(MessageKind::Grant, 4);

        let summary = sim.summary();
        assert_eq!(summary.iterations, 2);
        assert_eq!(summary.granted, 2);
        assert_eq!(summary.blocked, 1);
        assert_eq!(summary.messages_sent, 10);
        assert_eq!(sim.iteration(1).count(), 2);
        assert_eq!(
            sim.blocked().map(|r| r.requester).collect::<Vec<_>>(),
            vec![ProcessId(3)]
        );
    }

    #[test]
    fn test_outcome_serializes_lowercase() {
        let json = serde_json::to_string(&report(0, 4, Outcome::Blocked)).unwrap();
        assert!(json.starts_with(r#"{"iteration":0,"requester":4,"outcome":"blocked""#));
    }
}
