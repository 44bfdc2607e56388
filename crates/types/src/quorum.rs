//! Quorum assignment and the builder that lays quorums out.
//!
//! A [`QuorumSystem`] maps every process to the set of processes whose votes
//! it needs before entering the critical section. Mutual exclusion holds only
//! when any two quorums intersect: the shared member can vote for one
//! requester at a time.

use crate::{ConfigError, ProcessId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// The voters one process must collect a grant from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Quorum(BTreeSet<ProcessId>);

impl Quorum {
    /// Create a quorum from its members.
    pub fn new(members: impl IntoIterator<Item = ProcessId>) -> Self {
        Self(members.into_iter().collect())
    }

    /// Check whether a process is a voter in this quorum.
    pub fn contains(&self, id: ProcessId) -> bool {
        self.0.contains(&id)
    }

    /// Iterate members in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = ProcessId> + '_ {
        self.0.iter().copied()
    }

    /// Number of voters.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the quorum has no voters.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Check whether this quorum shares at least one voter with `other`.
    pub fn intersects(&self, other: &Quorum) -> bool {
        !self.0.is_disjoint(&other.0)
    }

    /// Check whether `votes` covers every voter of this quorum.
    pub fn is_covered_by(&self, votes: &BTreeSet<ProcessId>) -> bool {
        self.0.is_subset(votes)
    }

    /// Borrow the underlying member set.
    pub fn members(&self) -> &BTreeSet<ProcessId> {
        &self.0
    }
}

impl FromIterator<ProcessId> for Quorum {
    fn from_iter<I: IntoIterator<Item = ProcessId>>(iter: I) -> Self {
        Self::new(iter)
    }
}

/// How quorums are laid out over `n` processes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum QuorumLayout {
    /// Row plus column of a `ceil(sqrt(n))`-wide grid, owner included.
    ///
    /// Falls back to the full process set for `n < 3`.
    #[default]
    Grid,

    /// Every process except the owner.
    AllOthers,

    /// The `span` processes following the owner, wrapping around.
    ///
    /// Does not intersect in general; intended for scripted scenarios.
    Ring {
        /// Number of successors in each quorum.
        span: u32,
    },
}

impl QuorumLayout {
    /// Whether a builder checks pairwise intersection for this layout unless told otherwise.
    fn verified_by_default(self) -> bool {
        !matches!(self, QuorumLayout::Ring { .. })
    }
}

impl fmt::Display for QuorumLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuorumLayout::Grid => write!(f, "grid"),
            QuorumLayout::AllOthers => write!(f, "all-others"),
            QuorumLayout::Ring { span } => write!(f, "ring:{}", span),
        }
    }
}

impl FromStr for QuorumLayout {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "grid" => Ok(QuorumLayout::Grid),
            "all-others" | "allothers" => Ok(QuorumLayout::AllOthers),
            s if s.starts_with("ring:") => {
                let span: u32 = s[5..]
                    .parse()
                    .map_err(|_| ConfigError::InvalidLayout(format!("bad ring span: {}", &s[5..])))?;
                Ok(QuorumLayout::Ring { span })
            }
            _ => Err(ConfigError::InvalidLayout(s.to_string())),
        }
    }
}

impl TryFrom<String> for QuorumLayout {
    type Error = ConfigError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<QuorumLayout> for String {
    fn from(layout: QuorumLayout) -> Self {
        layout.to_string()
    }
}

/// Immutable quorum assignment for a fixed set of processes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuorumSystem {
    quorums: Vec<Quorum>,
}

impl QuorumSystem {
    /// Create a quorum system from an explicit assignment.
    ///
    /// `quorums[i]` is the quorum of process `i`. No intersection check is
    /// performed; call [`QuorumSystem::verify_intersection`] when it matters.
    pub fn from_quorums(quorums: Vec<Quorum>) -> Result<Self, ConfigError> {
        let n = quorums.len();
        if n == 0 {
            return Err(ConfigError::NoProcesses);
        }

        for (owner, quorum) in quorums.iter().enumerate() {
            if let Some(member) = quorum.iter().find(|m| !m.is_valid_for(n)) {
                return Err(ConfigError::MemberOutOfRange {
                    owner: ProcessId(owner as u32),
                    member,
                    n,
                });
            }
        }

        Ok(Self { quorums })
    }

    /// Number of processes.
    pub fn len(&self) -> usize {
        self.quorums.len()
    }

    /// Always false: a quorum system covers at least one process.
    pub fn is_empty(&self) -> bool {
        self.quorums.is_empty()
    }

    /// Quorum of a process, if the id is in range.
    pub fn quorum(&self, id: ProcessId) -> Option<&Quorum> {
        self.quorums.get(id.index())
    }

    /// Iterate `(owner, quorum)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (ProcessId, &Quorum)> {
        self.quorums
            .iter()
            .enumerate()
            .map(|(i, q)| (ProcessId(i as u32), q))
    }

    /// Check that every pair of distinct quorums shares a voter.
    ///
    /// Returns the first disjoint pair found, in ascending id order.
    pub fn verify_intersection(&self) -> Result<(), ConfigError> {
        for (a, qa) in self.iter() {
            for (b, qb) in self.iter().skip(a.index() + 1) {
                if !qa.intersects(qb) {
                    return Err(ConfigError::DisjointQuorums { a, b });
                }
            }
        }
        Ok(())
    }

    /// Largest quorum size.
    pub fn max_quorum_size(&self) -> usize {
        self.quorums.iter().map(Quorum::len).max().unwrap_or(0)
    }

    /// How many quorums each process votes in, indexed by process id.
    pub fn load(&self) -> Vec<usize> {
        let mut load = vec![0; self.len()];
        for quorum in &self.quorums {
            for member in quorum.iter() {
                load[member.index()] += 1;
            }
        }
        load
    }
}

/// Builds a [`QuorumSystem`] for `n` processes.
///
/// # Example
///
/// ```
/// use maekawa_types::{QuorumBuilder, QuorumLayout};
///
/// let quorums = QuorumBuilder::new(9).layout(QuorumLayout::Grid).build().unwrap();
/// assert_eq!(quorums.max_quorum_size(), 5);
/// ```
#[derive(Debug, Clone)]
pub struct QuorumBuilder {
    n: usize,
    layout: QuorumLayout,
    require_intersection: Option<bool>,
}

impl QuorumBuilder {
    /// Start a builder for `n` processes with the grid layout.
    pub fn new(n: usize) -> Self {
        Self {
            n,
            layout: QuorumLayout::default(),
            require_intersection: None,
        }
    }

    /// Set the layout.
    pub fn layout(mut self, layout: QuorumLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Force or skip the pairwise intersection check.
    ///
    /// Defaults to checking for every layout except `Ring`.
    pub fn require_intersection(mut self, required: bool) -> Self {
        self.require_intersection = Some(required);
        self
    }

    /// Compute the assignment.
    pub fn build(self) -> Result<QuorumSystem, ConfigError> {
        if self.n == 0 {
            return Err(ConfigError::NoProcesses);
        }

        let quorums = match self.layout {
            QuorumLayout::Grid => grid_quorums(self.n),
            QuorumLayout::AllOthers => all_others_quorums(self.n),
            QuorumLayout::Ring { span } => ring_quorums(self.n, span)?,
        };

        let system = QuorumSystem::from_quorums(quorums)?;
        if self
            .require_intersection
            .unwrap_or_else(|| self.layout.verified_by_default())
        {
            system.verify_intersection()?;
        }
        Ok(system)
    }
}

/// Smallest `k` with `k * k >= n`.
fn ceil_sqrt(n: usize) -> usize {
    let mut k = (n as f64).sqrt() as usize;
    while k * k < n {
        k += 1;
    }
    while k > 1 && (k - 1) * (k - 1) >= n {
        k -= 1;
    }
    k
}

fn grid_quorums(n: usize) -> Vec<Quorum> {
    if n < 3 {
        let everyone: Quorum = (0..n as u32).map(ProcessId).collect();
        return vec![everyone; n];
    }

    let width = ceil_sqrt(n);
    (0..n)
        .map(|i| {
            let (row, col) = (i / width, i % width);
            let row_members = (row * width..((row + 1) * width).min(n)).map(|p| ProcessId(p as u32));
            let col_members = (col..n).step_by(width).map(|p| ProcessId(p as u32));
            row_members.chain(col_members).collect()
        })
        .collect()
}

fn all_others_quorums(n: usize) -> Vec<Quorum> {
    (0..n as u32)
        .map(|owner| (0..n as u32).filter(|&p| p != owner).map(ProcessId).collect())
        .collect()
}

fn ring_quorums(n: usize, span: u32) -> Result<Vec<Quorum>, ConfigError> {
    if span == 0 || span as usize >= n {
        return Err(ConfigError::InvalidLayout(format!(
            "ring span {} needs 1 <= span < {}",
            span, n
        )));
    }

    Ok((0..n)
        .map(|owner| {
            (1..=span as usize)
                .map(|step| ProcessId(((owner + step) % n) as u32))
                .collect()
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[u32]) -> Quorum {
        raw.iter().copied().map(ProcessId).collect()
    }

    #[test]
    fn test_zero_processes_rejected() {
        assert_eq!(
            QuorumBuilder::new(0).build(),
            Err(ConfigError::NoProcesses)
        );
        assert_eq!(
            QuorumSystem::from_quorums(vec![]),
            Err(ConfigError::NoProcesses)
        );
    }

    #[test]
    fn test_grid_intersects_for_every_small_n() {
        for n in 1..=50 {
            let system = QuorumBuilder::new(n)
                .require_intersection(false)
                .build()
                .unwrap();
            assert_eq!(system.len(), n);
            assert!(
                system.verify_intersection().is_ok(),
                "grid quorums for n={} must intersect",
                n
            );
        }
    }

    #[test]
    fn test_grid_quorum_sizes_are_balanced() {
        for n in 3..=50 {
            let system = QuorumBuilder::new(n).build().unwrap();
            let width = ceil_sqrt(n);
            for (owner, quorum) in system.iter() {
                assert!(quorum.contains(owner), "owner votes in its own quorum");
                assert!(quorum.len() <= 2 * width - 1);
            }
        }
    }

    #[test]
    fn test_grid_layout_for_nine() {
        let system = QuorumBuilder::new(9).build().unwrap();

        // 3x3 grid: P4 sits in the middle
        assert_eq!(system.quorum(ProcessId(4)), Some(&ids(&[1, 3, 4, 5, 7])));
        assert_eq!(system.quorum(ProcessId(0)), Some(&ids(&[0, 1, 2, 3, 6])));
        assert_eq!(system.load(), vec![5; 9]);
    }

    #[test]
    fn test_small_n_uses_everyone() {
        let system = QuorumBuilder::new(2).build().unwrap();
        assert_eq!(system.quorum(ProcessId(0)), Some(&ids(&[0, 1])));
        assert_eq!(system.quorum(ProcessId(1)), Some(&ids(&[0, 1])));

        let single = QuorumBuilder::new(1).build().unwrap();
        assert_eq!(single.quorum(ProcessId(0)), Some(&ids(&[0])));
    }

    #[test]
    fn test_all_others() {
        let system = QuorumBuilder::new(3)
            .layout(QuorumLayout::AllOthers)
            .build()
            .unwrap();
        assert_eq!(system.quorum(ProcessId(0)), Some(&ids(&[1, 2])));
        assert_eq!(system.quorum(ProcessId(1)), Some(&ids(&[0, 2])));
        assert_eq!(system.quorum(ProcessId(2)), Some(&ids(&[0, 1])));

        // Two processes voting only for each other never overlap
        let err = QuorumBuilder::new(2)
            .layout(QuorumLayout::AllOthers)
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::DisjointQuorums {
                a: ProcessId(0),
                b: ProcessId(1)
            }
        );
    }

    #[test]
    fn test_ring_layout() {
        let system = QuorumBuilder::new(5)
            .layout(QuorumLayout::Ring { span: 2 })
            .build()
            .unwrap();
        assert_eq!(system.quorum(ProcessId(2)), Some(&ids(&[3, 4])));
        assert_eq!(system.quorum(ProcessId(4)), Some(&ids(&[0, 1])));

        // Ring layouts are not checked unless asked
        let err = QuorumBuilder::new(5)
            .layout(QuorumLayout::Ring { span: 2 })
            .require_intersection(true)
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::DisjointQuorums { .. }));

        assert!(matches!(
            QuorumBuilder::new(5)
                .layout(QuorumLayout::Ring { span: 5 })
                .build(),
            Err(ConfigError::InvalidLayout(_))
        ));
    }

    #[test]
    fn test_explicit_member_out_of_range() {
        let err = QuorumSystem::from_quorums(vec![ids(&[1]), ids(&[0, 2])]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::MemberOutOfRange {
                owner: ProcessId(1),
                member: ProcessId(2),
                n: 2
            }
        );
    }

    #[test]
    fn test_layout_parsing() {
        assert_eq!("grid".parse::<QuorumLayout>(), Ok(QuorumLayout::Grid));
        assert_eq!(
            "All-Others".parse::<QuorumLayout>(),
            Ok(QuorumLayout::AllOthers)
        );
        assert_eq!(
            "ring:3".parse::<QuorumLayout>(),
            Ok(QuorumLayout::Ring { span: 3 })
        );
        assert!("ring:x".parse::<QuorumLayout>().is_err());
        assert!("star".parse::<QuorumLayout>().is_err());
        assert_eq!(QuorumLayout::Ring { span: 2 }.to_string(), "ring:2");
    }

    #[test]
    fn test_ceil_sqrt() {
        assert_eq!(ceil_sqrt(1), 1);
        assert_eq!(ceil_sqrt(3), 2);
        assert_eq!(ceil_sqrt(4), 2);
        assert_eq!(ceil_sqrt(5), 3);
        assert_eq!(ceil_sqrt(49), 7);
        assert_eq!(ceil_sqrt(50), 8);
    }
}
