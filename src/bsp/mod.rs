//! Bulk-synchronous superstep engine shared by every backend
//!
//! # Architecture
//!
//! - `rank`: double-buffered [`RankVector`]
//! - `aggregator`: inbox/outbox [`MessageAggregator`] and [`ConcurrentAggregator`]
//! - `atomic`: lock-free and locked accumulation cells ([`AtomicF64`], [`LockedF64`])
//! - `dangling`: [`DanglingMassCollector`]
//! - `controller`: [`SuperstepController`], [`TerminationOracle`], the [`Superstep`] trait
//! - `blocks`: contiguous [`BlockLayout`] of the vertex range

pub mod aggregator;
pub mod atomic;
pub mod blocks;
pub mod controller;
pub mod dangling;
pub mod rank;

pub use aggregator::{ConcurrentAggregator, MessageAggregator};
pub use atomic::{AtomicAccumulate, AtomicF64, LockedF64};
pub use blocks::BlockLayout;
pub use controller::{StepReport, Superstep, SuperstepController, TerminationOracle};
pub use dangling::DanglingMassCollector;
pub use rank::RankVector;

/// Damping factor (Google standard), fixed
pub const DAMPING: f64 = 0.85;

/// Base rank every vertex receives each superstep, `(1 - d) / n`
#[must_use]
#[allow(clippy::cast_precision_loss)] // Graphs >2^53 vertices unlikely
pub fn teleport(n: usize) -> f64 {
    (1.0 - DAMPING) / n as f64
}

/// Run parameters shared by all backends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Upper bound on supersteps; fewer run if the graph goes quiet
    pub max_supersteps: usize,
}

impl EngineConfig {
    /// Config with a step budget
    #[must_use]
    pub const fn new(max_supersteps: usize) -> Self {
        Self { max_supersteps }
    }
}

/// Final ranks plus how the run ended
#[derive(Debug, Clone, PartialEq)]
pub struct PageRankResult {
    /// Rank of each vertex, in vertex-id order
    pub ranks: Vec<f64>,

    /// Number of supersteps executed
    pub supersteps: usize,

    /// True if the run stopped because no messages were sent
    pub quiesced: bool,
}

impl PageRankResult {
    /// Get rank of a specific vertex
    #[must_use]
    pub fn score(&self, vertex: usize) -> Option<f64> {
        self.ranks.get(vertex).copied()
    }

    /// Sum of all ranks
    #[must_use]
    pub fn total_mass(&self) -> f64 {
        self.ranks.iter().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_teleport() {
        assert!((teleport(3) - 0.05).abs() < 1e-12);
    }

    #[test]
    fn test_result_api() {
        let result = PageRankResult {
            ranks: vec![0.1, 0.3, 0.6],
            supersteps: 20,
            quiesced: false,
        };

        assert_eq!(result.score(0), Some(0.1));
        assert_eq!(result.score(2), Some(0.6));
        assert_eq!(result.score(3), None); // Out of bounds
        assert!((result.total_mass() - 1.0).abs() < 1e-12);
    }
}
