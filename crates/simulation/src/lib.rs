//! Deterministic simulation runner.
//!
//! This crate provides a fully deterministic environment for running the
//! protocol. Given the same seed, it produces identical results every run.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                  SimulationRunner                       │
//! │                                                         │
//! │  ┌────────────────────────────────────────────────────┐ │
//! │  │     MessageBus                                     │ │
//! │  │     FIFO per (sender, receiver) channel            │ │
//! │  └────────────────────────┬───────────────────────────┘ │
//! │                           │                             │
//! │                           ▼                             │
//! │  ┌────────────────────────────────────────────────────┐ │
//! │  │     processes: Vec<ProcessStateMachine>            │ │
//! │  │     Each processes events sequentially             │ │
//! │  └────────────────────────┬───────────────────────────┘ │
//! │                           │                             │
//! │                           ▼                             │
//! │  ┌────────────────────────────────────────────────────┐ │
//! │  │     Actions → new messages on the bus              │ │
//! │  └────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────┘
//! ```

mod error;
mod network;
mod runner;
mod trace;

pub use error::{RoutingError, SimulationError};
pub use network::{DeliveryOrder, MessageBus};
pub use runner::{RunnerConfig, SimulationRunner, SimulationStats};
pub use trace::TraceEvent;
