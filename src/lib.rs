//! bsp-pagerank: bulk-synchronous PageRank with interchangeable superstep backends
//!
//! # Overview
//!
//! PageRank is computed as a sequence of BSP supersteps. Each round, every
//! vertex forwards `rank / out_degree` to its destinations; a global barrier
//! settles those messages before the next round reads them. The same
//! protocol runs on four backends that differ only in how they synchronize:
//!
//! | Backend | Accumulation | Barrier |
//! |---------|--------------|---------|
//! | [`SequentialBackend`] | plain `f64` adds | program order |
//! | [`SharedMemoryBackend`] | CAS or locked cells | rayon join |
//! | [`DistributedBackend`] | per-worker buffers + all-reduce | blocking collectives |
//! | `gpu::gpu_pagerank` | WGSL CAS loop on `atomic<u32>` | queue wait |
//!
//! # Quick Start
//!
//! ```
//! use bsp_pagerank::{EngineConfig, GraphStore, SequentialBackend, SharedMemoryBackend};
//!
//! # fn main() -> anyhow::Result<()> {
//! let graph = GraphStore::parse("A B C\nB C\nC A\nD\n");
//! let config = EngineConfig::new(20);
//!
//! let reference = SequentialBackend.run(&graph, &config)?;
//! let parallel = SharedMemoryBackend::with_threads(4)?.run(&graph, &config)?;
//!
//! assert_eq!(reference.supersteps, parallel.supersteps);
//! for (a, b) in reference.ranks.iter().zip(&parallel.ranks) {
//!     assert!((a - b).abs() < 1e-12);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - **Storage**: [`GraphStore`] (array-of-sequences) and [`CsrGraph`] (device upload)
//! - **Persistence**: Parquet graph snapshots (feature `storage`)
//! - **Engine**: [`bsp`] rank buffers, aggregators, dangling mass, controller
//! - **Backends**: [`backends`], [`distributed`], `gpu` (feature `gpu`)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod backends;
pub mod bsp;
pub mod distributed;
pub mod report;
pub mod storage;

// GPU acceleration (optional)
#[cfg(feature = "gpu")]
pub mod gpu;

// Re-export core types
pub use backends::{execute, Backend, BackendOptions, SequentialBackend, SharedMemoryBackend};
pub use bsp::{EngineConfig, PageRankResult, StepReport, Superstep, DAMPING};
pub use distributed::{DistributedBackend, PartitionError};
pub use storage::{CsrGraph, GraphStore, VertexId};

#[cfg(feature = "gpu")]
pub use gpu::{gpu_pagerank, GpuDevice, GpuDeviceError};

// Error type
pub use anyhow::{Error, Result};
