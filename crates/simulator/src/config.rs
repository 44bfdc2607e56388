//! Configuration types for the simulator.

use crate::policy::RequestPolicyKind;
use crate::SimulatorError;
use maekawa_simulation::{DeliveryOrder, RunnerConfig};
use maekawa_types::{ConfigError, QuorumBuilder, QuorumLayout, QuorumSystem};
use serde::{Deserialize, Serialize};

/// Configuration for a simulation run.
///
/// Field names double as TOML keys. `process_count` and `iteration_count`
/// are required; every other key falls back to what [`SimulatorConfig::new`]
/// would set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimulatorConfig {
    /// Number of processes.
    pub process_count: usize,

    /// Number of driver iterations.
    pub iteration_count: u64,

    /// How requesters are picked each iteration.
    #[serde(default)]
    pub request_policy: RequestPolicyKind,

    /// Random seed. A fresh one is drawn when unset; the report records it.
    #[serde(default)]
    pub seed: Option<u64>,

    /// Requesters per iteration.
    #[serde(default = "default_contenders")]
    pub contenders: usize,

    /// Quorum layout.
    #[serde(default)]
    pub layout: QuorumLayout,

    /// Message delivery order.
    #[serde(default)]
    pub delivery: DeliveryOrder,

    /// Delivery budget for one drive to quiescence.
    #[serde(default = "default_max_deliveries")]
    pub max_deliveries: usize,
}

fn default_contenders() -> usize {
    1
}

fn default_max_deliveries() -> usize {
    RunnerConfig::default().max_deliveries
}

impl SimulatorConfig {
    /// Create a configuration with one requester per iteration.
    pub fn new(process_count: usize, iteration_count: u64) -> Self {
        Self {
            process_count,
            iteration_count,
            request_policy: RequestPolicyKind::default(),
            seed: None,
            contenders: default_contenders(),
            layout: QuorumLayout::default(),
            delivery: DeliveryOrder::default(),
            max_deliveries: default_max_deliveries(),
        }
    }

    /// Parse a TOML document.
    pub fn from_toml(source: &str) -> Result<Self, SimulatorError> {
        Ok(toml::from_str(source)?)
    }

    /// Set the request policy.
    pub fn with_request_policy(mut self, policy: RequestPolicyKind) -> Self {
        self.request_policy = policy;
        self
    }

    /// Set the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set the number of requesters per iteration.
    pub fn with_contenders(mut self, contenders: usize) -> Self {
        self.contenders = contenders;
        self
    }

    /// Set the quorum layout.
    pub fn with_layout(mut self, layout: QuorumLayout) -> Self {
        self.layout = layout;
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

    /// Check counts before anything is built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.process_count == 0 {
            return Err(ConfigError::NoProcesses);
        }
        if self.iteration_count == 0 {
            return Err(ConfigError::ZeroIterations);
        }
        if self.contenders == 0 || self.contenders > self.process_count {
            return Err(ConfigError::InvalidContenders {
                contenders: self.contenders,
                processes: self.process_count,
            });
        }
        Ok(())
    }

    /// Build the quorum system for this configuration.
    pub fn quorum_system(&self) -> Result<QuorumSystem, ConfigError> {
        QuorumBuilder::new(self.process_count)
            .layout(self.layout)
            .build()
    }

    /// Convert to a RunnerConfig for the underlying simulation.
    pub fn to_runner_config(&self, seed: u64) -> RunnerConfig {
        RunnerConfig::default()
            .with_seed(seed)
            .with_delivery(self.delivery)
            .with_max_deliveries(self.max_deliveries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_counts() {
        assert_eq!(SimulatorConfig::new(5, 3).validate(), Ok(()));
        assert_eq!(
            SimulatorConfig::new(0, 3).validate(),
            Err(ConfigError::NoProcesses)
        );
        assert_eq!(
            SimulatorConfig::new(4, 0).validate(),
            Err(ConfigError::ZeroIterations)
        );
        assert_eq!(
            SimulatorConfig::new(4, 1).with_contenders(5).validate(),
            Err(ConfigError::InvalidContenders {
                contenders: 5,
                processes: 4
            })
        );
        assert!(SimulatorConfig::new(4, 1)
            .with_contenders(0)
            .validate()
            .is_err());
    }

    #[test]
    fn test_from_toml() {
        let config = SimulatorConfig::from_toml(
            r#"
            process_count = 9
            iteration_count = 20
            request_policy = "round-robin"
            seed = 7
            contenders = 3
            layout = "ring:2"
            delivery = "shuffled"
            "#,
        )
        .unwrap();

        assert_eq!(
            config,
            SimulatorConfig::new(9, 20)
                .with_request_policy(RequestPolicyKind::RoundRobin)
                .with_seed(7)
                .with_contenders(3)
                .with_layout(QuorumLayout::Ring { span: 2 })
                .with_delivery(DeliveryOrder::Shuffled)
        );
    }

    #[test]
    fn test_from_toml_defaults_and_errors() {
        let config =
            SimulatorConfig::from_toml("process_count = 16\niteration_count = 4").unwrap();
        assert_eq!(config, SimulatorConfig::new(16, 4));

        assert!(SimulatorConfig::from_toml(
            "process_count = 3\niteration_count = 1\nlayout = \"hexagon\""
        )
        .is_err());
        assert!(SimulatorConfig::from_toml("processes = 3").is_err());
    }

    #[test]
    fn test_from_toml_requires_counts() {
        for source in ["process_count = 16", "iteration_count = 2", "seed = 1"] {
            assert!(
                matches!(
                    SimulatorConfig::from_toml(source),
                    Err(SimulatorError::Toml(_))
                ),
                "accepted {:?}",
                source
            );
        }
    }

    #[test]
    fn test_quorum_system_follows_layout() {
        let quorums = SimulatorConfig::new(9, 1).quorum_system().unwrap();
        assert_eq!(quorums.max_quorum_size(), 5);

        let config = SimulatorConfig::new(2, 1).with_layout(QuorumLayout::AllOthers);
        assert!(matches!(
            config.quorum_system(),
            Err(ConfigError::DisjointQuorums { .. })
        ));
    }
}
