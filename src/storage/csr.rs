//! CSR (Compressed Sparse Row) graph representation
//!
//! Based on `GraphBLAST` (Yang et al., ACM `ToMS` 2022) for GPU-optimized sparse matrix operations.
//!
//! # CSR Format
//!
//! ```text
//! Graph: 0 → 1, 0 → 2, 1 → 2   (vertex 2 dangling)
//!
//! CSR:
//!   row_offsets: [0, 2, 3, 3]  // Vertex 0: edges [0..2), Vertex 1: [2..3), Vertex 2: [3..3)
//!   col_indices: [1, 2, 2]      // Edge 0 → vertex 1, edge 1 → vertex 2, edge 2 → vertex 2
//! ```
//!
//! A vertex is dangling exactly when `row_offsets[v] == row_offsets[v + 1]`,
//! which is the test the device kernels use.

/// Contiguous CSR view of a [`GraphStore`](super::GraphStore)
///
/// Optimized for:
/// - O(1) access to outgoing edges
/// - GPU-friendly memory layout (two flat `u32` arrays)
///
/// # Example
///
/// ```
/// use bsp_pagerank::CsrGraph;
///
/// let graph = CsrGraph::from_adjacency(&[vec![1, 2], vec![2], vec![]]);
/// let (row_offsets, col_indices) = graph.csr_components();
///
/// assert_eq!(row_offsets, &[0, 2, 3, 3]);
/// assert_eq!(col_indices, &[1, 2, 2]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsrGraph {
    /// vertex i's edges start at `row_offsets`[i]
    /// Length: `num_nodes` + 1
    row_offsets: Vec<u32>,

    /// Column indices (edge targets)
    /// Length: `num_edges`
    col_indices: Vec<u32>,
}

impl CsrGraph {
    /// Flatten per-vertex out-edge sequences, preserving edge order
    #[must_use]
    pub fn from_adjacency(adjacency: &[Vec<u32>]) -> Self {
        let mut row_offsets = Vec::with_capacity(adjacency.len() + 1);
        let mut col_indices = Vec::with_capacity(adjacency.iter().map(Vec::len).sum());

        let mut offset = 0_u32;
        row_offsets.push(offset);

        for neighbors in adjacency {
            #[allow(clippy::cast_possible_truncation)] // Graphs >4B edges not supported yet
            let len_u32 = neighbors.len() as u32;
            offset += len_u32;
            row_offsets.push(offset);
            col_indices.extend_from_slice(neighbors);
        }

        Self {
            row_offsets,
            col_indices,
        }
    }

    /// Get number of nodes
    #[must_use]
    pub fn num_nodes(&self) -> usize {
        self.row_offsets.len() - 1
    }

    /// Get number of edges
    #[must_use]
    pub fn num_edges(&self) -> usize {
        self.col_indices.len()
    }

    /// Get CSR components (`row_offsets`, `col_indices`) for device upload
    #[must_use]
    pub fn csr_components(&self) -> (&[u32], &[u32]) {
        (&self.row_offsets, &self.col_indices)
    }
}
