//! Maekawa Simulator CLI
//!
//! Runs the mutual exclusion protocol over an in-process bus and narrates
//! every message, either as colored text or as one JSON object per line.

use anyhow::{Context, Result};
use clap::Parser;
use colored::{ColoredString, Colorize};
use maekawa_core::ProcessState;
use maekawa_simulation::{DeliveryOrder, TraceEvent};
use maekawa_simulator::{RequestPolicyKind, Simulator, SimulatorConfig};
use maekawa_types::QuorumLayout;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "maekawa-sim")]
#[command(about = "Simulate Maekawa quorum-based mutual exclusion")]
#[command(version)]
struct Cli {
    /// Number of processes
    #[arg(short = 'n', long, required_unless_present = "config")]
    processes: Option<usize>,

    /// Number of iterations
    #[arg(short, long, required_unless_present = "config")]
    iterations: Option<u64>,

    /// Requester selection (random, round-robin)
    #[arg(long)]
    policy: Option<RequestPolicyKind>,

    /// Random seed; a fresh one is drawn and printed when omitted
    #[arg(long)]
    seed: Option<u64>,

    /// Processes requesting the critical section each iteration
    #[arg(long)]
    contenders: Option<usize>,

    /// Quorum layout (grid, all-others, ring:<span>)
    #[arg(long)]
    layout: Option<QuorumLayout>,

    /// Message delivery order (fifo, shuffled)
    #[arg(long)]
    delivery: Option<DeliveryOrder>,

    /// Delivery budget per drive to quiescence
    #[arg(long)]
    max_deliveries: Option<usize>,

    /// TOML configuration file; flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Emit one JSON object per trace event instead of text
    #[arg(long)]
    json: bool,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,
}

impl Cli {
    fn to_config(&self) -> Result<SimulatorConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let source = std::fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                SimulatorConfig::from_toml(&source)
                    .with_context(|| format!("parsing {}", path.display()))?
            }
            None => {
                let processes = self
                    .processes
                    .context("--processes is required without --config")?;
                let iterations = self
                    .iterations
                    .context("--iterations is required without --config")?;
                SimulatorConfig::new(processes, iterations)
            }
        };

        if let Some(processes) = self.processes {
            config.process_count = processes;
        }
        if let Some(iterations) = self.iterations {
            config.iteration_count = iterations;
        }
        if let Some(policy) = self.policy {
            config.request_policy = policy;
        }
        if let Some(seed) = self.seed {
            config.seed = Some(seed);
        }
        if let Some(contenders) = self.contenders {
            config.contenders = contenders;
        }
        if let Some(layout) = self.layout {
            config.layout = layout;
        }
        if let Some(delivery) = self.delivery {
            config.delivery = delivery;
        }
        if let Some(max_deliveries) = self.max_deliveries {
            config.max_deliveries = max_deliveries;
        }
        Ok(config)
    }
}

fn banner(title: &str) {
    println!("{}", "-------------------".purple());
    println!("{}", title.purple());
    println!("{}", "-------------------".purple());
}

/// One line of narration for a trace event.
fn narrate(event: &TraceEvent) -> ColoredString {
    match event {
        TraceEvent::Sent { message, .. } => format!(
            "{} sends {} to {} @{}",
            message.from, message.kind, message.to, message.timestamp
        )
        .normal(),
        TraceEvent::Delivered { message, .. } => format!(
            "{} receives {} from {}",
            message.to, message.kind, message.from
        )
        .dimmed(),
        TraceEvent::StateChanged {
            process, from, to, ..
        } => match (from, to) {
            (ProcessState::Released, ProcessState::Wanted) => {
                format!("{} requests CS", process).cyan()
            }
            (_, ProcessState::Held) => format!("{} enters CS", process).green().bold(),
            (ProcessState::Held, _) => format!("{} releases CS", process).red(),
            _ => format!("{} {} -> {}", process, from, to).normal(),
        },
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays a clean event stream
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(!cli.no_color)
        .init();

    if cli.no_color {
        colored::control::set_override(false);
    }

    let config = cli.to_config()?;
    let mut simulator = Simulator::new(config).context("invalid configuration")?;

    if cli.json {
        let stdout = std::io::stdout();
        simulator.run_json_lines(&mut stdout.lock())?;
        return Ok(());
    }

    banner("Maekawa's Algorithm");
    println!();
    banner("Quorums");
    for (id, quorum) in simulator.quorums().iter() {
        let members: Vec<String> = quorum.iter().map(|m| m.to_string()).collect();
        println!("{}: {}", id, members.join(" "));
    }
    println!();

    let mut current = None;
    let report = simulator.run_with(|event| {
        if current != Some(event.iteration()) {
            current = Some(event.iteration());
            println!();
            println!("{}", format!("Iteration {}", event.iteration() + 1).yellow());
        }
        println!("{}", narrate(event));
    })?;

    for blocked in report.blocked() {
        println!(
            "{}",
            format!(
                "{} is blocked in iteration {}",
                blocked.requester,
                blocked.iteration + 1
            )
            .red()
        );
    }
    report.print();
    Ok(())
}
