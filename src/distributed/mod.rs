//! Distributed-memory superstep backend
//!
//! Workers are OS threads that share nothing but a [`Communicator`]. Rank 0
//! ingests the graph and ships every other worker its block of out-edges.
//! Each superstep, workers push shares into full-length local outboxes.
//! The outboxes, dangling mass and messages-sent flags are then combined
//! by collective reductions. Final ranks are gathered back at rank 0.
//!
//! # Architecture
//!
//! - `comm`: [`Communicator`] trait and the crossbeam-channel star transport
//! - `partition`: [`Partition`] and [`PartitionManager`]
//! - `worker`: the per-worker superstep loop

pub mod comm;
pub mod partition;
mod worker;

pub use comm::{ChannelCommunicator, CommError, Communicator, Packet};
pub use partition::{Partition, PartitionError, PartitionManager};

use crate::bsp::{EngineConfig, PageRankResult};
use crate::storage::GraphStore;
use anyhow::{anyhow, Result};
use log::info;
use std::thread;

/// Message-passing backend with a fixed number of in-process workers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DistributedBackend {
    workers: usize,
}

impl DistributedBackend {
    /// Backend with `workers` workers (at least one)
    #[must_use]
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    /// Number of workers
    #[must_use]
    pub const fn workers(&self) -> usize {
        self.workers
    }

    /// Compute ranks for `graph`
    ///
    /// # Errors
    ///
    /// - [`PartitionError::EmptyGraph`] (wrapped) if `graph` has no vertices
    /// - transport failures from any worker; the lowest-ranked error wins
    pub fn run(&self, graph: &GraphStore, config: &EngineConfig) -> Result<PageRankResult> {
        let communicators = ChannelCommunicator::star(self.workers);

        let outcomes: Vec<Result<Option<PageRankResult>>> = thread::scope(|scope| {
            let handles: Vec<_> = communicators
                .into_iter()
                .map(|comm| {
                    let graph = (comm.rank() == 0).then_some(graph);
                    thread::Builder::new()
                        .name(format!("bsp-worker-{}", comm.rank()))
                        .spawn_scoped(scope, move || worker::run_worker(&comm, graph, config))
                })
                .collect();

            handles
                .into_iter()
                .enumerate()
                .map(|(rank, handle)| match handle {
                    Ok(handle) => handle
                        .join()
                        .map_err(|_| anyhow!("Worker {rank} panicked"))
                        .and_then(|outcome| outcome),
                    Err(e) => Err(anyhow!("Failed to spawn worker {rank}: {e}")),
                })
                .collect()
        });

        let mut result = None;
        for outcome in outcomes {
            if let Some(root) = outcome? {
                result = Some(root);
            }
        }
        let result = result.ok_or_else(|| anyhow!("Root worker returned no ranks"))?;

        info!(
            "distributed run finished on {} workers: {} supersteps, quiesced={}",
            self.workers, result.supersteps, result.quiesced
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::SequentialBackend;

    #[test]
    fn test_matches_sequential() {
        let graph = GraphStore::parse("A B C\nB C D\nC A\nD\nE A D E\n");
        let config = EngineConfig::new(25);
        let expected = SequentialBackend.run(&graph, &config).unwrap();

        for workers in [1, 2, 3, 5, 8] {
            let actual = DistributedBackend::new(workers).run(&graph, &config).unwrap();
            assert_eq!(actual.supersteps, expected.supersteps);
            for (a, b) in actual.ranks.iter().zip(&expected.ranks) {
                assert!((a - b).abs() < 1e-12, "{workers} workers: {a} vs {b}");
            }
        }
    }

    #[test]
    fn test_quiescence_is_global() {
        // Nobody sends in round 1, so every worker stops after it
        let graph = GraphStore::parse("X\nY\nZ\n");
        let result = DistributedBackend::new(3)
            .run(&graph, &EngineConfig::new(10))
            .unwrap();
        assert_eq!(result.supersteps, 1);
        assert!(result.quiesced);
        for rank in &result.ranks {
            assert!((rank - 1.0 / 3.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_empty_graph_is_fatal() {
        let err = DistributedBackend::new(2)
            .run(&GraphStore::new(), &EngineConfig::new(3))
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<PartitionError>(),
            Some(&PartitionError::EmptyGraph)
        );
    }

    #[test]
    fn test_zero_workers_clamped() {
        assert_eq!(DistributedBackend::new(0).workers(), 1);
    }
}
