//! Per-worker superstep loop

use super::comm::Communicator;
use super::partition::{Partition, PartitionManager};
use crate::bsp::{
    teleport, DanglingMassCollector, EngineConfig, MessageAggregator, PageRankResult, RankVector,
    StepReport, Superstep, SuperstepController, DAMPING,
};
use crate::storage::GraphStore;
use anyhow::{Context, Result};

/// Superstep state owned by one worker
///
/// Ranks cover only the owned block. The message buffers are full length,
/// so a share can address any vertex; the outbox is all-reduced before it
/// settles into the next inbox.
pub(crate) struct WorkerEngine<'c, C: Communicator> {
    comm: &'c C,
    partition: Partition,
    ranks: RankVector,
    messages: MessageAggregator,
}

impl<'c, C: Communicator> WorkerEngine<'c, C> {
    #[allow(clippy::cast_precision_loss)]
    pub(crate) fn new(comm: &'c C, partition: Partition) -> Self {
        let n = partition.num_vertices();
        Self {
            comm,
            ranks: RankVector::filled(partition.len(), 1.0 / n as f64),
            messages: MessageAggregator::new(n),
            partition,
        }
    }

    pub(crate) fn local_ranks(&self) -> &[f64] {
        self.ranks.current()
    }
}

impl<C: Communicator> Superstep for WorkerEngine<'_, C> {
    #[allow(clippy::cast_precision_loss)]
    fn superstep(&mut self) -> Result<StepReport> {
        let n = self.partition.num_vertices();
        let base = teleport(n);

        self.messages.begin_superstep();
        let (current, next) = self.ranks.split();

        let inbox = &self.messages.inbox()[self.partition.range()];
        for (slot, &incoming) in next.iter_mut().zip(inbox) {
            *slot = base + DAMPING * incoming;
        }

        let mut dangling = DanglingMassCollector::new();
        let mut sent = false;
        for (local, edges) in self.partition.out_edges().iter().enumerate() {
            if edges.is_empty() {
                dangling.add(current[local]);
                continue;
            }

            let share = current[local] / edges.len() as f64;
            for &destination in edges {
                self.messages.send(destination as usize, share);
            }
            sent = true;
        }

        // Barrier: every collective below blocks until all workers arrive
        self.comm
            .all_reduce_sum(self.messages.outbox_mut())
            .with_context(|| format!("Outbox reduction failed on worker {}", self.comm.rank()))?;
        let dangling_mass = self.comm.all_reduce_scalar(dangling.mass())?;
        let messages_sent = self.comm.all_reduce_or(sent)?;

        let dangling_share = DanglingMassCollector::from_mass(dangling_mass).into_share(n);
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

/// Everything one worker does, from partitioning to gather
///
/// Returns the assembled result at the root and `None` elsewhere. All
/// workers see identical reduced reports, so their controllers stop on the
/// same superstep.
pub(crate) fn run_worker<C: Communicator>(
    comm: &C,
    graph: Option<&GraphStore>,
    config: &EngineConfig,
) -> Result<Option<PageRankResult>> {
    let partition = PartitionManager::distribute(comm, graph)
        .with_context(|| format!("Worker {} failed to initialize", comm.rank()))?;

    let mut controller = SuperstepController::new(config);
    let mut engine = WorkerEngine::new(comm, partition);
    controller.run(&mut engine)?;

    let ranks = PartitionManager::gather(comm, &engine.partition, engine.local_ranks())
        .with_context(|| format!("Worker {} failed to gather ranks", comm.rank()))?;

    Ok(ranks.map(|ranks| PageRankResult {
        ranks,
        supersteps: controller.completed(),
        quiesced: controller.quiesced(),
    }))
}
