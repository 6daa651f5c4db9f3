//! Generator: randomized search for small feedback arc sets
//!
//! Each generator repeatedly samples a vertex ordering, takes the back-edges
//! under that ordering as a candidate, and publishes the candidate only when
//! it is strictly smaller than anything this generator published before.

use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::graph::{Graph, VertexOrder};
use crate::shm::{Phase, Publish, Ring, ShmError};
use crate::solution::Candidate;

/// When the ordering is reshuffled relative to deriving a candidate.
///
/// Both policies reshuffle once per iteration, rejected candidates included;
/// they differ only in whether the very first candidate comes from the
/// identity ordering (`After`) or from a random one (`Before`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShufflePolicy {
    /// Shuffle, then derive
    Before,
    /// Derive from the current ordering, then shuffle
    #[default]
    After,
}

impl FromStr for ShufflePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "before" => Ok(Self::Before),
            "after" => Ok(Self::After),
            _ => Err(format!("Unknown shuffle policy: {}. Use: before or after", s)),
        }
    }
}

impl fmt::Display for ShufflePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Before => write!(f, "before"),
            Self::After => write!(f, "after"),
        }
    }
}

/// Seed derived from process identity and the high-resolution clock
pub fn process_seed() -> u64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default();
    u64::from(std::process::id())
        .wrapping_mul(1_000_000_000)
        .wrapping_add(nanos)
}

/// Counters reported when a generator stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GeneratorStats {
    pub iterations: u64,
    pub improvements: u64,
    pub published: u64,
    pub best: Option<usize>,
}

/// Local search state for one generator process
#[derive(Debug)]
pub struct Generator<R> {
    graph: Graph,
    order: VertexOrder,
    rng: R,
    policy: ShufflePolicy,
    best: Option<usize>,
    stats: GeneratorStats,
}

impl<R: Rng> Generator<R> {
    pub fn new(graph: Graph, rng: R, policy: ShufflePolicy) -> Self {
        debug!(vertices = graph.vertex_count(), edges = graph.edges().len(), %policy, "Generator::new: called");
        let order = VertexOrder::identity(graph.vertex_count());
        Self {
            graph,
            order,
            rng,
            policy,
            best: None,
            stats: GeneratorStats::default(),
        }
    }

    /// Smallest edge count this generator has produced
    pub fn best(&self) -> Option<usize> {
        self.best
    }

    pub fn stats(&self) -> GeneratorStats {
        GeneratorStats {
            best: self.best,
            ..self.stats
        }
    }

    /// Derive one candidate; `Some` only when it beats the local best
    pub fn step(&mut self) -> Option<Candidate> {
        self.stats.iterations += 1;
        if self.policy == ShufflePolicy::Before {
            self.order.shuffle(&mut self.rng);
        }
        let candidate = self.order.candidate(self.graph.edges());
        if self.policy == ShufflePolicy::After {
            self.order.shuffle(&mut self.rng);
        }

        if !candidate.improves_on(self.best) {
            return None;
        }
        self.best = Some(candidate.edge_count());
        self.stats.improvements += 1;
        debug!(
            edge_count = candidate.edge_count(),
            truncated = candidate.is_truncated(),
            "Generator::step: local improvement"
        );
        Some(candidate)
    }

    /// Search and publish improvements until the run stops being `Running`
    pub fn run(&mut self, ring: &Ring) -> Result<GeneratorStats, ShmError> {
        info!("Starting generator");
        while ring.phase() == Phase::Running {
            let Some(candidate) = self.step() else {
                continue;
            };
            match ring.publish(&candidate)? {
                Publish::Written { slot } => {
                    self.stats.published += 1;
                    info!(slot, edge_count = candidate.edge_count(), "Published solution");
                }
                Publish::ShuttingDown => break,
            }
        }
        let stats = self.stats();
        info!(?stats, "Generator stopped");
        Ok(stats)
    }
}
