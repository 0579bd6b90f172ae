//! Graph storage layer
//!
//! Provides the ingested [`GraphStore`], its contiguous CSR view, and Parquet snapshots.

pub mod csr;
pub mod graph;
#[cfg(feature = "storage")]
pub mod parquet;

pub use csr::CsrGraph;
pub use graph::{GraphStore, VertexId};
