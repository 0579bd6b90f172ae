//! Shared-memory superstep backend (rayon fork-join)
//!
//! Each superstep forks one task per contiguous vertex block onto a fixed
//! thread pool. Tasks write their own slice of the next ranks and send
//! shares through a [`ConcurrentAggregator`]; the dangling mass and the
//! messages-sent flag come back through a rayon reduction. `install`
//! returning is the superstep barrier.

use crate::bsp::{
    teleport, AtomicAccumulate, AtomicF64, BlockLayout, ConcurrentAggregator,
    DanglingMassCollector, EngineConfig, PageRankResult, RankVector, StepReport, Superstep,
    SuperstepController, DAMPING,
};
use crate::storage::GraphStore;
use anyhow::{Context, Result};
use log::info;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::marker::PhantomData;

/// Fork-join backend over a fixed pool, generic over the accumulation cell
#[derive(Debug)]
pub struct SharedMemoryBackend<C: AtomicAccumulate = AtomicF64> {
    pool: ThreadPool,
    cells: PhantomData<C>,
}

impl SharedMemoryBackend {
    /// Pool of `threads` workers using compare-and-swap cells
    ///
    /// # Errors
    ///
    /// Returns error if the thread pool cannot be built
    pub fn with_threads(threads: usize) -> Result<Self> {
        Self::with_cells(threads)
    }
}

impl<C: AtomicAccumulate> SharedMemoryBackend<C> {
    /// Pool of `threads` workers using cell type `C`
    ///
    /// # Errors
    ///
    /// Returns error if the thread pool cannot be built
    pub fn with_cells(threads: usize) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .thread_name(|index| format!("bsp-shared-{index}"))
            .build()
            .with_context(|| format!("Failed to build a {threads}-thread pool"))?;

        Ok(Self {
            pool,
            cells: PhantomData,
        })
    }

    /// Number of pool threads
    #[must_use]
    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Compute ranks for `graph`
    ///
    /// # Errors
    ///
    /// Propagates superstep failures (none are expected on this backend)
    pub fn run(&self, graph: &GraphStore, config: &EngineConfig) -> Result<PageRankResult> {
        let mut controller = SuperstepController::new(config);
        let mut engine = SharedMemoryEngine::<C>::new(graph, &self.pool);

        if graph.num_vertices() > 0 {
            controller.run(&mut engine)?;
        }

        info!(
            "shared-memory run finished on {} threads: {} supersteps, quiesced={}",
            self.threads(),
            controller.completed(),
            controller.quiesced()
        );

        Ok(PageRankResult {
            ranks: engine.ranks.into_current(),
            supersteps: controller.completed(),
            quiesced: controller.quiesced(),
        })
    }
}

struct SharedMemoryEngine<'a, C: AtomicAccumulate> {
    graph: &'a GraphStore,
    pool: &'a ThreadPool,
    layout: BlockLayout,
    ranks: RankVector,
    messages: ConcurrentAggregator<C>,
}

impl<'a, C: AtomicAccumulate> SharedMemoryEngine<'a, C> {
    fn new(graph: &'a GraphStore, pool: &'a ThreadPool) -> Self {
        let n = graph.num_vertices();
        Self {
            graph,
            pool,
            layout: BlockLayout::new(n, pool.current_num_threads()),
            ranks: RankVector::uniform(n),
            messages: ConcurrentAggregator::new(n),
        }
    }
}

impl<C: AtomicAccumulate> Superstep for SharedMemoryEngine<'_, C> {
    #[allow(clippy::cast_precision_loss)]
    fn superstep(&mut self) -> Result<StepReport> {
        let n = self.graph.num_vertices();
        let base = teleport(n);
        let block_len = self.layout.block_len().max(1);

        self.messages.begin_superstep();
        let graph = self.graph;
        let messages = &self.messages;
        let (current, next) = self.ranks.split();

        let (dangling, messages_sent) = self.pool.install(|| {
            next.par_chunks_mut(block_len)
                .enumerate()
                .map(|(block, slots)| {
                    let start = block * block_len;
                    let mut dangling = DanglingMassCollector::new();
                    let mut sent = false;

                    for (offset, slot) in slots.iter_mut().enumerate() {
                        let vertex = start + offset;
                        *slot = base + DAMPING * messages.inbox()[vertex];

                        let edges = &graph.adjacency()[vertex];
                        if edges.is_empty() {
                            dangling.add(current[vertex]);
                            continue;
                        }

                        let share = current[vertex] / edges.len() as f64;
                        for &destination in edges {
                            messages.send(destination as usize, share);
                        }
                        sent = true;
                    }

                    (dangling, sent)
                })
                .reduce(
                    || (DanglingMassCollector::new(), false),
                    |(left, left_sent), (right, right_sent)| {
                        (left.merge(right), left_sent || right_sent)
                    },
                )
        });

        let dangling_mass = dangling.mass();
        let dangling_share = dangling.into_share(n);
        self.pool
            .install(|| next.par_iter_mut().for_each(|slot| *slot += dangling_share));

        self.ranks.swap();
        self.messages.settle();

        Ok(StepReport {
            messages_sent,
            dangling_mass,
        })
    }
}
