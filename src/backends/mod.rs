//! CPU superstep backends and backend selection
//!
//! - `sequential`: reference single-threaded realization
//! - `shared`: rayon fork-join with atomic accumulation
//!
//! The distributed backend lives in [`crate::distributed`], the accelerated
//! one in `crate::gpu` (feature `gpu`).

mod sequential;
mod shared;

pub use sequential::{SequentialBackend, SequentialEngine};
pub use shared::SharedMemoryBackend;

use crate::bsp::{EngineConfig, PageRankResult};
use crate::distributed::DistributedBackend;
use crate::storage::GraphStore;
use anyhow::Result;
use std::fmt;

/// Available superstep backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum Backend {
    /// Single thread, vertex-id order
    Sequential,
    /// Fork-join thread pool with atomic accumulation
    Shared,
    /// Message-passing workers with collective reductions
    Distributed,
    /// Compute kernels on a wgpu device (feature `gpu`)
    Accelerated,
}

impl Backend {
    /// Every backend, in declaration order
    pub const ALL: [Self; 4] = [
        Self::Sequential,
        Self::Shared,
        Self::Distributed,
        Self::Accelerated,
    ];

    /// Short lowercase name, as used on the command line and in output paths
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Sequential => "sequential",
            Self::Shared => "shared",
            Self::Distributed => "distributed",
            Self::Accelerated => "accelerated",
        }
    }

    /// Whether this build can run the backend
    #[must_use]
    pub const fn is_compiled_in(self) -> bool {
        match self {
            Self::Accelerated => cfg!(feature = "gpu"),
            _ => true,
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Knobs for the concurrent backends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendOptions {
    /// Shared-memory pool size
    pub threads: usize,

    /// Distributed worker count
    pub workers: usize,
}

impl Default for BackendOptions {
    fn default() -> Self {
        let parallelism = std::thread::available_parallelism().map_or(1, usize::from);
        Self {
            threads: parallelism,
            workers: parallelism,
        }
    }
}

/// Run `backend` over `graph`
///
/// # Errors
///
/// Returns error if the backend fails to initialize or a superstep fails,
/// or if `Accelerated` is requested from a build without the `gpu` feature
pub async fn execute(
    backend: Backend,
    graph: &GraphStore,
    config: &EngineConfig,
    options: &BackendOptions,
) -> Result<PageRankResult> {
    match backend {
        Backend::Sequential => SequentialBackend.run(graph, config),
        Backend::Shared => SharedMemoryBackend::with_threads(options.threads)?.run(graph, config),
        Backend::Distributed => DistributedBackend::new(options.workers).run(graph, config),
        Backend::Accelerated => accelerated(graph, config).await,
    }
}

#[cfg(feature = "gpu")]
async fn accelerated(graph: &GraphStore, config: &EngineConfig) -> Result<PageRankResult> {
    let device = crate::gpu::GpuDevice::new().await?;
    crate::gpu::gpu_pagerank(&device, graph, config).await
}

#[cfg(not(feature = "gpu"))]
#[allow(clippy::unused_async)]
async fn accelerated(_graph: &GraphStore, _config: &EngineConfig) -> Result<PageRankResult> {
    anyhow::bail!("The accelerated backend requires building with `--features gpu`")
}
