//! Vertex partitioning across distributed workers

use super::comm::{CommError, Communicator};
use crate::bsp::BlockLayout;
use crate::storage::GraphStore;
use log::debug;
use std::ops::Range;
use thiserror::Error;

/// Failures while setting up partitions
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PartitionError {
    /// The broadcast vertex count was zero (e.g. ingestion failed at the root)
    #[error("Cannot partition an empty graph (broadcast vertex count was 0)")]
    EmptyGraph,

    /// Collective failure during distribution or gather
    #[error("Partition transport failed: {0}")]
    Comm(#[from] CommError),
}

/// One worker's contiguous share of the vertex range
///
/// Holds out-edges only; a push-style superstep never needs in-edges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    rank: usize,
    layout: BlockLayout,
    out_edges: Vec<Vec<u32>>,
}

impl Partition {
    /// Owning worker's rank
    #[must_use]
    pub const fn rank(&self) -> usize {
        self.rank
    }

    /// Total vertices in the whole graph
    #[must_use]
    pub const fn num_vertices(&self) -> usize {
        self.layout.num_vertices()
    }

    /// Global ids owned by this partition
    #[must_use]
    pub fn range(&self) -> Range<usize> {
        self.layout.range(self.rank)
    }

    /// Number of owned vertices
    #[must_use]
    pub fn len(&self) -> usize {
        self.out_edges.len()
    }

    /// Whether this partition owns no vertices
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.out_edges.is_empty()
    }

    /// Out-edges of owned vertices, indexed by local offset
    #[must_use]
    pub fn out_edges(&self) -> &[Vec<u32>] {
        &self.out_edges
    }
}

/// Splits the graph at the root and reassembles ranks afterwards
pub struct PartitionManager;

impl PartitionManager {
    /// Collective: every worker calls this; only the root passes `Some(graph)`
    ///
    /// The root broadcasts the vertex count, then ships each worker its
    /// block of out-edges.
    ///
    /// # Errors
    ///
    /// - [`PartitionError::EmptyGraph`] if the broadcast count is zero,
    ///   including when the root was given no graph
    /// - [`PartitionError::Comm`] on transport failure
    pub fn distribute<C: Communicator>(
        comm: &C,
        graph: Option<&GraphStore>,
    ) -> Result<Partition, PartitionError> {
        let is_root = comm.rank() == 0;
        let announced = graph.map_or(0, GraphStore::num_vertices);
        let num_vertices = comm.broadcast_count(announced)?;
        if num_vertices == 0 {
            return Err(PartitionError::EmptyGraph);
        }

        let layout = BlockLayout::new(num_vertices, comm.size());
        let expected = layout.range(comm.rank()).len();

        let out_edges = if is_root {
            let graph = graph.ok_or(PartitionError::EmptyGraph)?;
            let adjacency = graph.adjacency();
            for (worker, range) in layout.ranges().enumerate().skip(1) {
                debug!("worker {worker} receives vertices {range:?}");
                comm.send_edges(worker, adjacency[range].to_vec())?;
            }
            adjacency[layout.range(0)].to_vec()
        } else {
            comm.recv_edges()?
        };

        if out_edges.len() != expected {
            return Err(CommError::LengthMismatch {
                expected,
                actual: out_edges.len(),
            }
            .into());
        }

        Ok(Partition {
            rank: comm.rank(),
            layout,
            out_edges,
        })
    }

    /// Collective: reassemble per-worker rank slices in id order at the root
    ///
    /// # Errors
    ///
    /// Returns [`PartitionError::Comm`] on transport failure or if the
    /// gathered length disagrees with the layout
    pub fn gather<C: Communicator>(
        comm: &C,
        partition: &Partition,
        local_ranks: &[f64],
    ) -> Result<Option<Vec<f64>>, PartitionError> {
        let gathered = comm.gather(local_ranks)?;
        if let Some(ranks) = &gathered {
            if ranks.len() != partition.num_vertices() {
                return Err(CommError::LengthMismatch {
                    expected: partition.num_vertices(),
                    actual: ranks.len(),
                }
                .into());
            }
        }
        Ok(gathered)
    }
}
