//! GPU buffer management for CSR graph data
//!
//! Uploads the read-only CSR arrays (`row_offsets`, `col_indices`) that every
//! superstep kernel binds.

use super::{GpuDevice, GpuDeviceError};
use crate::storage::CsrGraph;

/// GPU buffers for CSR graph representation
#[derive(Debug)]
pub struct GpuCsrBuffers {
    /// Number of nodes in the graph
    pub num_nodes: usize,

    /// Number of edges in the graph
    pub num_edges: usize,

    /// GPU buffer for `row_offsets` (size: `num_nodes` + 1)
    pub row_offsets: wgpu::Buffer,

    /// GPU buffer for `col_indices` (size: `max(num_edges, 1)`)
    pub col_indices: wgpu::Buffer,
}

impl GpuCsrBuffers {
    /// Upload CSR graph to GPU
    ///
    /// An edgeless graph still gets a one-element `col_indices` buffer, since
    /// storage bindings cannot be empty.
    ///
    /// # Errors
    ///
    /// Returns [`GpuDeviceError::BufferAllocation`] if buffer creation fails
    pub async fn from_csr_graph(device: &GpuDevice, graph: &CsrGraph) -> Result<Self, GpuDeviceError> {
        let (row_offsets_data, col_indices_data) = graph.csr_components();

        let row_offsets = device
            .create_buffer_init(
                "CSR row_offsets",
                bytemuck::cast_slice(row_offsets_data),
                wgpu::BufferUsages::STORAGE,
            )
            .await?;

        let padding = [0_u32];
        let col_indices_data = if col_indices_data.is_empty() {
            &padding[..]
        } else {
            col_indices_data
        };
        let col_indices = device
            .create_buffer_init(
                "CSR col_indices",
                bytemuck::cast_slice(col_indices_data),
                wgpu::BufferUsages::STORAGE,
            )
            .await?;

        Ok(Self {
            num_nodes: graph.num_nodes(),
            num_edges: graph.num_edges(),
            row_offsets,
            col_indices,
        })
    }

    /// Get number of nodes
    #[must_use]
    pub const fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    /// Get number of edges
    #[must_use]
    pub const fn num_edges(&self) -> usize {
        self.num_edges
    }
}
