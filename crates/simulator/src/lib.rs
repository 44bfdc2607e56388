//! Maekawa Simulator
//!
//! An iteration driver built on top of the simulation framework, plus the
//! `maekawa-sim` command-line front end.
//!
//! # Architecture
//!
//! The simulator builds on `maekawa-simulation` to provide:
//!
//! - **Request Policies**: who asks for the critical section each iteration
//!   (random, round-robin, or a fixed script)
//! - **Iteration Driving**: request, drain to quiescence, release holders,
//!   repeat until nobody new gets in
//! - **Reporting**: per-requester outcome (granted or blocked) and the
//!   messages it exchanged, plus message counts for the run
//! - **Configuration**: builder-style setup, loadable from TOML
//!
//! # Example
//!
//! ```
//! use maekawa_simulator::{RequestPolicyKind, Simulator, SimulatorConfig};
//!
//! let config = SimulatorConfig::new(9, 20)
//!     .with_request_policy(RequestPolicyKind::RoundRobin)
//!     .with_contenders(3)
//!     .with_seed(12345);
//!
//! let mut simulator = Simulator::new(config).unwrap();
//! let report = simulator.run().unwrap();
//!
//! assert_eq!(report.blocks(), 0);
//! println!("granted {} requests", report.grants());
//! ```

pub mod config;
pub mod error;
pub mod policy;
pub mod report;
pub mod runner;

pub use config::SimulatorConfig;
pub use error::SimulatorError;
pub use policy::{RandomPolicy, RequestPolicy, RequestPolicyKind, RoundRobinPolicy, ScriptedPolicy};
pub use report::{IterationReport, Outcome, SimulationReport, SimulationSummary};
pub use runner::Simulator;
