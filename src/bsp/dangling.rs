//! Dangling-mass collection
//!
//! Rank held by vertices without out-edges is not forwarded. It is summed
//! once per superstep, from the same snapshot senders read, and spread
//! uniformly over all vertices.

use super::DAMPING;
use std::iter::Sum;

/// Per-superstep sum of dangling-vertex rank
///
/// Partial collectors built by different threads or workers are combined
/// with [`merge`](Self::merge) (or `Sum`). The total is consumed exactly once
/// by [`into_share`](Self::into_share).
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct DanglingMassCollector {
    mass: f64,
}

impl DanglingMassCollector {
    /// Zeroed collector
    #[must_use]
    pub const fn new() -> Self {
        Self { mass: 0.0 }
    }

    /// Collector holding an already-reduced total
    #[must_use]
    pub const fn from_mass(mass: f64) -> Self {
        Self { mass }
    }

    /// Add one dangling vertex's current rank
    pub fn add(&mut self, rank: f64) {
        self.mass += rank;
    }

    /// Combine two partial collectors
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        Self {
            mass: self.mass + other.mass,
        }
    }

    /// Mass collected so far
    #[must_use]
    pub const fn mass(&self) -> f64 {
        self.mass
    }

    /// Uniform per-vertex addition `d · mass / n`
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn into_share(self, n: usize) -> f64 {
        if n == 0 {
            return 0.0;
        }
        DAMPING * self.mass / n as f64
    }
}

impl Sum for DanglingMassCollector {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::new(), Self::merge)
    }
}
