//! Contiguous block split of the vertex range
//!
//! `n` vertices are cut into `parts` blocks of `ceil(n / parts)`; the last
//! non-empty block is truncated and any blocks past `n` are empty. The same
//! layout drives the shared-memory chunking and the distributed partitions,
//! so distribution and final gather always agree on boundaries.

use std::ops::Range;

/// Block boundaries for `parts` owners of `n` vertices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockLayout {
    num_vertices: usize,
    parts: usize,
    block_len: usize,
}

impl BlockLayout {
    /// Layout for `num_vertices` split over `parts` owners (at least one)
    #[must_use]
    pub fn new(num_vertices: usize, parts: usize) -> Self {
        let parts = parts.max(1);
        Self {
            num_vertices,
            parts,
            block_len: num_vertices.div_ceil(parts),
        }
    }

    /// Total vertices covered
    #[must_use]
    pub const fn num_vertices(&self) -> usize {
        self.num_vertices
    }

    /// Nominal block length, `ceil(n / parts)`
    #[must_use]
    pub const fn block_len(&self) -> usize {
        self.block_len
    }

    /// Vertex range owned by `part` (empty when past the end)
    #[must_use]
    pub fn range(&self, part: usize) -> Range<usize> {
        let start = (part * self.block_len).min(self.num_vertices);
        let end = (start + self.block_len).min(self.num_vertices);
        start..end
    }

    /// Every owner's range, in order
    pub fn ranges(&self) -> impl Iterator<Item = Range<usize>> + '_ {
        (0..self.parts).map(|part| self.range(part))
    }
}
