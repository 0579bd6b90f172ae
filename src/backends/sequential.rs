//! Sequential superstep backend
//!
//! Reference realization: one thread, vertex-id order, plain `f64` buffers.
//! Every other backend is checked against this one.

use crate::bsp::{
    teleport, DanglingMassCollector, EngineConfig, MessageAggregator, PageRankResult, RankVector,
    StepReport, Superstep, SuperstepController, DAMPING,
};
use crate::storage::GraphStore;
use anyhow::Result;
use log::info;

/// Single-threaded superstep state over a borrowed graph
#[derive(Debug, Clone)]
pub struct SequentialEngine<'g> {
    graph: &'g GraphStore,
    ranks: RankVector,
    messages: MessageAggregator,
}

impl<'g> SequentialEngine<'g> {
    /// Uniform initial ranks, empty inbox
    #[must_use]
    pub fn new(graph: &'g GraphStore) -> Self {
        let n = graph.num_vertices();
        Self {
            graph,
            ranks: RankVector::uniform(n),
            messages: MessageAggregator::new(n),
        }
    }

    /// Ranks after the last completed superstep
    #[must_use]
    pub fn ranks(&self) -> &[f64] {
        self.ranks.current()
    }

    /// Messages settled by the last completed superstep
    #[must_use]
    pub fn inbox(&self) -> &[f64] {
        self.messages.inbox()
    }

    /// Take the final ranks
    #[must_use]
    pub fn into_ranks(self) -> Vec<f64> {
        self.ranks.into_current()
    }
}

impl Superstep for SequentialEngine<'_> {
    #[allow(clippy::cast_precision_loss)]
    fn superstep(&mut self) -> Result<StepReport> {
        let n = self.graph.num_vertices();
        let base = teleport(n);

        self.messages.begin_superstep();
        let (current, next) = self.ranks.split();

        for (slot, &incoming) in next.iter_mut().zip(self.messages.inbox()) {
            *slot = base + DAMPING * incoming;
        }

        let mut dangling = DanglingMassCollector::new();
        let mut messages_sent = false;
        for (vertex, edges) in self.graph.adjacency().iter().enumerate() {
            if edges.is_empty() {
                dangling.add(current[vertex]);
                continue;
            }

            let share = current[vertex] / edges.len() as f64;
            for &destination in edges {
                self.messages.send(destination as usize, share);
            }
            messages_sent = true;
        }

        let dangling_mass = dangling.mass();
        let dangling_share = dangling.into_share(n);
        for slot in next.iter_mut() {
            *slot += dangling_share;
        }

        self.ranks.swap();
        self.messages.settle();

        Ok(StepReport {
            messages_sent,
            dangling_mass,
        })
    }
}

/// Runs supersteps on the calling thread
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialBackend;

impl SequentialBackend {
    /// Compute ranks for `graph`
    ///
    /// # Errors
    ///
    /// This backend has no failure path; the `Result` matches the other backends
    ///
    /// # Example
    ///
    /// ```
    /// use bsp_pagerank::{EngineConfig, GraphStore, SequentialBackend};
    ///
    /// let graph = GraphStore::parse("A B C\nB C\nC A\n");
    /// let result = SequentialBackend.run(&graph, &EngineConfig::new(1)).unwrap();
    /// assert!(result.ranks.iter().all(|r| (r - 0.05).abs() < 1e-12));
    /// ```
    pub fn run(&self, graph: &GraphStore, config: &EngineConfig) -> Result<PageRankResult> {
        let mut controller = SuperstepController::new(config);
        let mut engine = SequentialEngine::new(graph);

        if graph.num_vertices() > 0 {
            controller.run(&mut engine)?;
        }

        info!(
            "sequential run finished: {} supersteps, quiesced={}",
            controller.completed(),
            controller.quiesced()
        );

        Ok(PageRankResult {
            ranks: engine.into_ranks(),
            supersteps: controller.completed(),
            quiesced: controller.quiesced(),
        })
    }
}
