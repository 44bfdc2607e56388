//! Requester selection.
//!
//! Each iteration the driver asks its policy who should request the
//! critical section. Policies draw from the driver's seeded RNG, so a run is
//! reproducible from its seed.

use maekawa_types::{ConfigError, ProcessId};
use rand::seq::index;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Picks the requesters of one iteration.
pub trait RequestPolicy {
    /// Up to `count` distinct processes that should request next.
    fn next_requesters(&mut self, count: usize, rng: &mut dyn RngCore) -> Vec<ProcessId>;
}

/// Uniformly random distinct requesters.
#[derive(Debug, Clone)]
pub struct RandomPolicy {
    process_count: usize,
}

impl RandomPolicy {
    pub fn new(process_count: usize) -> Self {
        Self { process_count }
    }
}

impl RequestPolicy for RandomPolicy {
    fn next_requesters(&mut self, count: usize, rng: &mut dyn RngCore) -> Vec<ProcessId> {
        let amount = count.min(self.process_count);
        index::sample(rng, self.process_count, amount)
            .into_iter()
            .map(|i| ProcessId(i as u32))
            .collect()
    }
}

/// Cycles through process ids in order.
#[derive(Debug, Clone)]
pub struct RoundRobinPolicy {
    process_count: usize,
    next: usize,
}

impl RoundRobinPolicy {
    pub fn new(process_count: usize) -> Self {
        Self {
            process_count,
            next: 0,
        }
    }
}

impl RequestPolicy for RoundRobinPolicy {
    fn next_requesters(&mut self, count: usize, _rng: &mut dyn RngCore) -> Vec<ProcessId> {
        if self.process_count == 0 {
            return Vec::new();
        }
        let amount = count.min(self.process_count);
        let picked = (0..amount)
            .map(|offset| ProcessId(((self.next + offset) % self.process_count) as u32))
            .collect();
        self.next = (self.next + amount) % self.process_count;
        picked
    }
}

/// Replays fixed requester sets, one per iteration, wrapping around.
///
/// Ignores `count`; useful for scripting exact scenarios.
#[derive(Debug, Clone)]
pub struct ScriptedPolicy {
    rounds: Vec<Vec<ProcessId>>,
    next: usize,
}

impl ScriptedPolicy {
    pub fn new(rounds: Vec<Vec<ProcessId>>) -> Self {
        Self { rounds, next: 0 }
    }
}

impl RequestPolicy for ScriptedPolicy {
    fn next_requesters(&mut self, _count: usize, _rng: &mut dyn RngCore) -> Vec<ProcessId> {
        if self.rounds.is_empty() {
            return Vec::new();
        }
        let round = self.rounds[self.next % self.rounds.len()].clone();
        self.next += 1;
        round
    }
}

/// Built-in policies selectable from configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestPolicyKind {
    /// See [`RandomPolicy`].
    #[default]
    Random,

    /// See [`RoundRobinPolicy`].
    RoundRobin,
}

impl RequestPolicyKind {
    /// Instantiate the policy for `process_count` processes.
    pub fn build(self, process_count: usize) -> Box<dyn RequestPolicy> {
        match self {
            RequestPolicyKind::Random => Box::new(RandomPolicy::new(process_count)),
            RequestPolicyKind::RoundRobin => Box::new(RoundRobinPolicy::new(process_count)),
        }
    }
}

impl fmt::Display for RequestPolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RequestPolicyKind::Random => "random",
            RequestPolicyKind::RoundRobin => "round-robin",
        })
    }
}

impl FromStr for RequestPolicyKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "random" => Ok(RequestPolicyKind::Random),
            "round-robin" | "roundrobin" => Ok(RequestPolicyKind::RoundRobin),
            _ => Err(ConfigError::InvalidPolicy(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::collections::BTreeSet;

    fn ids(raw: &[u32]) -> Vec<ProcessId> {
        raw.iter().copied().map(ProcessId).collect()
    }

    #[test]
    fn test_round_robin_wraps() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let mut policy = RoundRobinPolicy::new(5);
        assert_eq!(policy.next_requesters(1, &mut rng), ids(&[0]));
        assert_eq!(policy.next_requesters(3, &mut rng), ids(&[1, 2, 3]));
        assert_eq!(policy.next_requesters(3, &mut rng), ids(&[4, 0, 1]));
        assert_eq!(policy.next_requesters(9, &mut rng).len(), 5);
    }

    #[test]
    fn test_random_is_distinct_and_in_range() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut policy = RandomPolicy::new(10);
        for _ in 0..50 {
            let picked = policy.next_requesters(4, &mut rng);
            assert_eq!(picked.len(), 4);
            assert_eq!(picked.iter().collect::<BTreeSet<_>>().len(), 4);
            assert!(picked.iter().all(|id| id.is_valid_for(10)));
        }
    }

    #[test]
    fn test_random_is_seeded() {
        let draw = |seed| {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let mut policy = RandomPolicy::new(100);
            (0..10)
                .map(|_| policy.next_requesters(1, &mut rng)[0])
                .collect::<Vec<_>>()
        };
        assert_eq!(draw(11), draw(11));
    }

    #[test]
    fn test_random_covers_every_process() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let mut policy = RandomPolicy::new(5);
        let seen: BTreeSet<_> = (0..200)
            .flat_map(|_| policy.next_requesters(1, &mut rng))
            .collect();
        assert_eq!(seen.len(), 5);
    }

    #[test]
    fn test_scripted_replays() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let mut policy = ScriptedPolicy::new(vec![ids(&[2]), ids(&[0, 1])]);
        assert_eq!(policy.next_requesters(1, &mut rng), ids(&[2]));
        assert_eq!(policy.next_requesters(1, &mut rng), ids(&[0, 1]));
        assert_eq!(policy.next_requesters(1, &mut rng), ids(&[2]));
    }

    #[test]
    fn test_policy_kind_parsing() {
        assert_eq!("random".parse::<RequestPolicyKind>(), Ok(RequestPolicyKind::Random));
        assert_eq!("Round-Robin".parse::<RequestPolicyKind>(), Ok(RequestPolicyKind::RoundRobin));
        assert_eq!(
            "zipf".parse::<RequestPolicyKind>(),
            Err(ConfigError::InvalidPolicy("zipf".to_string()))
        );
        assert_eq!(RequestPolicyKind::RoundRobin.to_string(), "round-robin");
    }
}
