//! Driver errors.

use maekawa_simulation::SimulationError;
use maekawa_types::ConfigError;
use thiserror::Error;

/// Why a simulation could not start or had to stop.
///
/// A requester that never gets its votes is not an error; it shows up as
/// [`Outcome::Blocked`](crate::Outcome::Blocked) in the report.
#[derive(Debug, Error)]
pub enum SimulatorError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to parse configuration file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("simulation aborted: {0}")]
    Simulation(#[from] SimulationError),

    #[error("failed to encode trace event: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to write trace: {0}")]
    Io(#[from] std::io::Error),
}
