//! Superstep driver for the accelerated backend
//!
//! One WGSL module, three entry points, one bind-group layout. Rank and
//! message buffers come in pairs; two bind groups select which member of
//! each pair is read and which is written, so swapping them at the round
//! boundary is just flipping the parity.
//!
//! Per superstep:
//!
//! 1. clear outbox + status, dispatch `update_ranks` then `reduce_dangling`,
//!    wait for the queue
//! 2. read back the 8-byte status (dangling mass bits, messages-sent flag)
//! 3. write the dangling share into the params uniform, dispatch
//!    `add_dangling_share`, wait for the queue

use super::{GpuCsrBuffers, GpuDevice, GpuDeviceError};
use crate::bsp::{
    DanglingMassCollector, EngineConfig, PageRankResult, StepReport, SuperstepController, DAMPING,
};
use crate::storage::{CsrGraph, GraphStore};
use anyhow::{Context, Result};
use log::info;

const SHADER: &str = include_str!("shaders/pagerank.wgsl");

/// Threads per workgroup; must match `WORKGROUP_SIZE` in the shader
const WORKGROUP_SIZE: u32 = 256;

/// Kernel parameters (uniform, binding 0)
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct KernelParams {
    num_nodes: u32,
    damping: f32,
    dangling_share: f32,
    _padding: u32,
}

/// Host view of the status buffer (binding 7)
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct DeviceStatus {
    dangling_bits: u32,
    messages_sent: u32,
}

/// Workgroups for one thread per vertex, checked against the device limit
///
/// An oversized dispatch would be a validation error, which wgpu reports
/// through its uncaptured-error handler instead of a `Result`.
fn dispatch_size(num_nodes: usize, limit: u32) -> Result<u32, GpuDeviceError> {
    let workgroups = num_nodes.div_ceil(WORKGROUP_SIZE as usize).max(1);
    u32::try_from(workgroups)
        .ok()
        .filter(|&groups| groups <= limit)
        .ok_or(GpuDeviceError::DispatchTooLarge {
            vertices: num_nodes,
            workgroups,
            limit,
        })
}

struct KernelPipelines {
    layout: wgpu::BindGroupLayout,
    update_ranks: wgpu::ComputePipeline,
    reduce_dangling: wgpu::ComputePipeline,
    add_dangling_share: wgpu::ComputePipeline,
}

impl KernelPipelines {
    /// Compile the module and build all three pipelines
    ///
    /// Validation errors are captured in an error scope, so a bad shader
    /// surfaces as [`GpuDeviceError::ShaderBuild`] with the compiler's text.
    async fn build(device: &GpuDevice) -> Result<Self, GpuDeviceError> {
        let gpu = device.device();
        gpu.push_error_scope(wgpu::ErrorFilter::Validation);

        let module = gpu.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("PageRank Superstep Shader"),
            source: wgpu::ShaderSource::Wgsl(SHADER.into()),
        });

        let layout = gpu.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("PageRank Bind Group Layout"),
            entries: &[
                // @binding(0): uniform params
                layout_entry(0, wgpu::BufferBindingType::Uniform),
                // @binding(1): row_offsets (read)
                layout_entry(1, wgpu::BufferBindingType::Storage { read_only: true }),
                // @binding(2): col_indices (read)
                layout_entry(2, wgpu::BufferBindingType::Storage { read_only: true }),
                // @binding(3): current ranks (read)
                layout_entry(3, wgpu::BufferBindingType::Storage { read_only: true }),
                // @binding(4): next ranks (read_write)
                layout_entry(4, wgpu::BufferBindingType::Storage { read_only: false }),
                // @binding(5): inbox (read)
                layout_entry(5, wgpu::BufferBindingType::Storage { read_only: true }),
                // @binding(6): outbox (atomic)
                layout_entry(6, wgpu::BufferBindingType::Storage { read_only: false }),
                // @binding(7): status (atomic)
                layout_entry(7, wgpu::BufferBindingType::Storage { read_only: false }),
            ],
        });

        let pipeline_layout = gpu.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("PageRank Pipeline Layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });

        let pipeline = |entry_point: &'static str| {
            gpu.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(entry_point),
                layout: Some(&pipeline_layout),
                module: &module,
                entry_point,
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                cache: None,
            })
        };
        let update_ranks = pipeline("update_ranks");
        let reduce_dangling = pipeline("reduce_dangling");
        let add_dangling_share = pipeline("add_dangling_share");

        if let Some(error) = gpu.pop_error_scope().await {
            return Err(GpuDeviceError::ShaderBuild(error.to_string()));
        }

        Ok(Self {
            layout,
            update_ranks,
            reduce_dangling,
            add_dangling_share,
        })
    }
}

fn layout_entry(binding: u32, ty: wgpu::BufferBindingType) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

/// Helper: copy `size` bytes of `buffer` to a staging buffer and read them back
async fn read_buffer<T: bytemuck::Pod>(
    device: &GpuDevice,
    buffer: &wgpu::Buffer,
    size: u64,
) -> Result<Vec<T>> {
    let staging_buffer = device
        .create_buffer(
            "Readback Staging",
            size,
            wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
        )
        .await?;

    let mut encoder = device
        .device()
        .create_command_encoder(&wgpu::CommandEncoderDescriptor::default());
    encoder.copy_buffer_to_buffer(buffer, 0, &staging_buffer, 0, size);
    device.queue().submit(Some(encoder.finish()));

    let buffer_slice = staging_buffer.slice(..);
    let (tx, rx) = futures_intrusive::channel::shared::oneshot_channel();

    buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });

    device.device().poll(wgpu::Maintain::Wait);
    rx.receive()
        .await
        .context("Failed to receive map result")?
        .context("Buffer mapping failed")?;

    let data = buffer_slice.get_mapped_range();
    let values: Vec<T> = bytemuck::cast_slice(&data).to_vec();
    drop(data);
    staging_buffer.unmap();

    Ok(values)
}

/// Owns the device-side superstep state for one graph
pub struct DeviceKernelDriver<'d> {
    device: &'d GpuDevice,
    csr: GpuCsrBuffers,
    pipelines: KernelPipelines,
    params: wgpu::Buffer,
    ranks: [wgpu::Buffer; 2],
    messages: [wgpu::Buffer; 2],
    status: wgpu::Buffer,
    bind_groups: [wgpu::BindGroup; 2],
    workgroups: u32,
    parity: usize,
}

impl<'d> DeviceKernelDriver<'d> {
    /// Build kernels and upload `graph` with uniform initial ranks
    ///
    /// # Errors
    ///
    /// Returns [`GpuDeviceError::DispatchTooLarge`] if the graph needs more
    /// workgroups than the device allows, [`GpuDeviceError::ShaderBuild`] if
    /// the kernels fail to build and [`GpuDeviceError::BufferAllocation`] if
    /// the device runs out of memory
    #[allow(clippy::cast_possible_truncation)]
    #[allow(clippy::cast_precision_loss)]
    pub async fn new(device: &'d GpuDevice, graph: &CsrGraph) -> Result<Self, GpuDeviceError> {
        let num_nodes = graph.num_nodes();
        let workgroups = dispatch_size(
            num_nodes,
            device.device().limits().max_compute_workgroups_per_dimension,
        )?;
        let pipelines = KernelPipelines::build(device).await?;
        let csr = GpuCsrBuffers::from_csr_graph(device, graph).await?;

        let params = device
            .create_buffer_init(
                "PageRank Params",
                bytemuck::bytes_of(&KernelParams {
                    num_nodes: num_nodes as u32,
                    damping: DAMPING as f32,
                    dangling_share: 0.0,
                    _padding: 0,
                }),
                wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            )
            .await?;

        let slots = num_nodes.max(1);
        let initial = vec![1.0 / num_nodes.max(1) as f32; slots];
        let zeros = vec![0.0_f32; slots];
        let storage = wgpu::BufferUsages::STORAGE
            | wgpu::BufferUsages::COPY_SRC
            | wgpu::BufferUsages::COPY_DST;

        let ranks = [
            device
                .create_buffer_init("Ranks A", bytemuck::cast_slice(&initial), storage)
                .await?,
            device
                .create_buffer_init("Ranks B", bytemuck::cast_slice(&zeros), storage)
                .await?,
        ];
        let messages = [
            device
                .create_buffer_init("Messages A", bytemuck::cast_slice(&zeros), storage)
                .await?,
            device
                .create_buffer_init("Messages B", bytemuck::cast_slice(&zeros), storage)
                .await?,
        ];
        let status = device
            .create_buffer_init(
                "Superstep Status",
                bytemuck::bytes_of(&DeviceStatus {
                    dangling_bits: 0,
                    messages_sent: 0,
                }),
                storage,
            )
            .await?;

        // Parity p reads ranks[p]/messages[p] and writes ranks[1-p]/messages[1-p]
        let bind_group = |read: usize| {
            let write = 1 - read;
            device
                .device()
                .create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("PageRank Bind Group"),
                    layout: &pipelines.layout,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: params.as_entire_binding(),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: csr.row_offsets.as_entire_binding(),
                        },
                        wgpu::BindGroupEntry {
                            binding: 2,
                            resource: csr.col_indices.as_entire_binding(),
                        },
                        wgpu::BindGroupEntry {
                            binding: 3,
                            resource: ranks[read].as_entire_binding(),
                        },
                        wgpu::BindGroupEntry {
                            binding: 4,
                            resource: ranks[write].as_entire_binding(),
                        },
                        wgpu::BindGroupEntry {
                            binding: 5,
                            resource: messages[read].as_entire_binding(),
                        },
                        wgpu::BindGroupEntry {
                            binding: 6,
                            resource: messages[write].as_entire_binding(),
                        },
                        wgpu::BindGroupEntry {
                            binding: 7,
                            resource: status.as_entire_binding(),
                        },
                    ],
                })
        };
        let bind_groups = [bind_group(0), bind_group(1)];

        Ok(Self {
            device,
            csr,
            pipelines,
            params,
            ranks,
            messages,
            status,
            bind_groups,
            workgroups,
            parity: 0,
        })
    }

    /// Number of vertices on the device
    #[must_use]
    pub const fn num_nodes(&self) -> usize {
        self.csr.num_nodes()
    }

    fn dispatch(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        label: &str,
        pipeline: &wgpu::ComputePipeline,
    ) {
        let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some(label),
            timestamp_writes: None,
        });
        compute_pass.set_pipeline(pipeline);
        compute_pass.set_bind_group(0, &self.bind_groups[self.parity], &[]);
        compute_pass.dispatch_workgroups(self.workgroups, 1, 1);
    }

    /// Run one superstep on the device
    ///
    /// # Errors
    ///
    /// Returns error if a buffer readback fails
    #[allow(clippy::cast_possible_truncation)]
    #[allow(clippy::cast_precision_loss)]
    pub async fn superstep(&mut self) -> Result<StepReport> {
        let outbox = &self.messages[1 - self.parity];

        // Kernels 1 and 2, ordered within one submission
        let mut encoder =
            self.device
                .device()
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Superstep Accumulate"),
                });
        encoder.clear_buffer(outbox, 0, None);
        encoder.clear_buffer(&self.status, 0, None);
        self.dispatch(&mut encoder, "update_ranks", &self.pipelines.update_ranks);
        self.dispatch(&mut encoder, "reduce_dangling", &self.pipelines.reduce_dangling);
        self.device.queue().submit(Some(encoder.finish()));
        self.device.device().poll(wgpu::Maintain::Wait);

        let status: Vec<DeviceStatus> = read_buffer(
            self.device,
            &self.status,
            std::mem::size_of::<DeviceStatus>() as u64,
        )
        .await
        .context("Failed to read superstep status")?;
        let status = status
            .first()
            .copied()
            .context("Superstep status readback was empty")?;

        let dangling_mass = f64::from(f32::from_bits(status.dangling_bits));
        let dangling_share = DanglingMassCollector::from_mass(dangling_mass).into_share(self.num_nodes());

        // Kernel 3 reads the share from the uniform
        self.device.queue().write_buffer(
            &self.params,
            0,
            bytemuck::bytes_of(&KernelParams {
                num_nodes: self.num_nodes() as u32,
                damping: DAMPING as f32,
                dangling_share: dangling_share as f32,
                _padding: 0,
            }),
        );
        let mut encoder =
            self.device
                .device()
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Superstep Dangling Share"),
                });
        self.dispatch(
            &mut encoder,
            "add_dangling_share",
            &self.pipelines.add_dangling_share,
        );
        self.device.queue().submit(Some(encoder.finish()));
        self.device.device().poll(wgpu::Maintain::Wait);

        self.parity = 1 - self.parity;

        Ok(StepReport {
            messages_sent: status.messages_sent != 0,
            dangling_mass,
        })
    }

    /// Read the current ranks back, widened to `f64`
    ///
    /// # Errors
    ///
    /// Returns error if the readback fails
    pub async fn read_ranks(&self) -> Result<Vec<f64>> {
        let size = (self.num_nodes() * std::mem::size_of::<f32>()) as u64;
        let ranks: Vec<f32> = read_buffer(self.device, &self.ranks[self.parity], size)
            .await
            .context("Failed to read ranks")?;
        Ok(ranks.into_iter().map(f64::from).collect())
    }
}

/// Run the accelerated backend over `graph`
///
/// Device values are `f32`; results match the CPU backends to single
/// precision.
///
/// # Errors
///
/// Returns error if:
/// - kernel build fails ([`GpuDeviceError::ShaderBuild`])
/// - buffer creation fails ([`GpuDeviceError::BufferAllocation`])
/// - a readback fails
///
/// # Example
///
/// ```ignore
/// # use bsp_pagerank::gpu::{gpu_pagerank, GpuDevice};
/// # use bsp_pagerank::{EngineConfig, GraphStore};
/// # async fn example() -> anyhow::Result<()> {
/// let device = GpuDevice::new().await?;
/// let graph = GraphStore::parse("A B C\nB C\nC A\n");
/// let result = gpu_pagerank(&device, &graph, &EngineConfig::new(20)).await?;
/// println!("A: {:?}", result.score(0));
/// # Ok(())
/// # }
/// ```
pub async fn gpu_pagerank(
    device: &GpuDevice,
    graph: &GraphStore,
    config: &EngineConfig,
) -> Result<PageRankResult> {
    let mut controller = SuperstepController::new(config);

    if graph.num_vertices() == 0 {
        return Ok(PageRankResult {
            ranks: Vec::new(),
            supersteps: 0,
            quiesced: false,
        });
    }

    let mut driver = DeviceKernelDriver::new(device, &graph.to_csr()).await?;
    while controller.should_run() {
        let report = driver.superstep().await?;
        controller.record(report);
    }
    let ranks = driver.read_ranks().await?;

    info!(
        "accelerated run finished on {}: {} supersteps, quiesced={}",
        device.info().name,
        controller.completed(),
        controller.quiesced()
    );

    Ok(PageRankResult {
        ranks,
        supersteps: controller.completed(),
        quiesced: controller.quiesced(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::SequentialBackend;

    async fn device_or_skip(test: &str) -> Option<GpuDevice> {
        if !GpuDevice::is_gpu_available().await {
            eprintln!("⚠️  Skipping {test}: GPU not available");
            return None;
        }
        GpuDevice::new().await.ok()
    }

    #[test]
    fn test_dispatch_size_within_limit() {
        assert_eq!(dispatch_size(0, 65_535).unwrap(), 1);
        assert_eq!(dispatch_size(256, 65_535).unwrap(), 1);
        assert_eq!(dispatch_size(257, 65_535).unwrap(), 2);
        assert_eq!(dispatch_size(65_535 * 256, 65_535).unwrap(), 65_535);
    }

    #[test]
    fn test_dispatch_size_over_limit_is_error() {
        let err = dispatch_size(65_535 * 256 + 1, 65_535).unwrap_err();
        assert!(matches!(
            err,
            GpuDeviceError::DispatchTooLarge {
                workgroups: 65_536,
                limit: 65_535,
                ..
            }
        ));

        // Past u32 workgroups as well
        assert!(dispatch_size(usize::MAX, u32::MAX).is_err());
    }

    fn assert_close(actual: &[f64], expected: &[f64]) {
        assert_eq!(actual.len(), expected.len());
        for (v, (a, b)) in actual.iter().zip(expected).enumerate() {
            let tolerance = 1e-5 * b.abs().max(1e-2);
            assert!((a - b).abs() < tolerance, "vertex {v}: {a} vs {b}");
        }
    }

    #[test]
    fn test_params_layout() {
        // Uniform structs must be a multiple of 16 bytes
        assert_eq!(std::mem::size_of::<KernelParams>(), 16);
        assert_eq!(std::mem::size_of::<DeviceStatus>(), 8);
    }

    #[test]
    fn test_shader_declares_entry_points() {
        for entry in ["fn update_ranks", "fn reduce_dangling", "fn add_dangling_share"] {
            assert!(SHADER.contains(entry), "missing {entry}");
        }
        assert!(SHADER.contains("const WORKGROUP_SIZE: u32 = 256u;"));
    }

    #[tokio::test]
    async fn test_example_a_first_superstep() {
        let Some(device) = device_or_skip("test_example_a_first_superstep").await else {
            return;
        };

        let graph = GraphStore::parse("A B C\nB C\nC A\n");
        let result = gpu_pagerank(&device, &graph, &EngineConfig::new(1))
            .await
            .unwrap();

        assert_eq!(result.supersteps, 1);
        assert_close(&result.ranks, &[0.05, 0.05, 0.05]);
    }

    #[tokio::test]
    async fn test_single_dangling_vertex_halts() {
        let Some(device) = device_or_skip("test_single_dangling_vertex_halts").await else {
            return;
        };

        let graph = GraphStore::parse("X\n");
        let result = gpu_pagerank(&device, &graph, &EngineConfig::new(5))
            .await
            .unwrap();

        assert_eq!(result.supersteps, 1);
        assert!(result.quiesced);
        assert_close(&result.ranks, &[1.0]);
    }

    #[tokio::test]
    async fn test_matches_sequential_across_workgroups() {
        let Some(device) = device_or_skip("test_matches_sequential_across_workgroups").await
        else {
            return;
        };

        // 600 vertices spans three workgroups; every seventh vertex dangles
        let mut text = String::new();
        for v in 0..600 {
            if v % 7 == 0 {
                text.push_str(&format!("{v}\n"));
            } else {
                text.push_str(&format!("{v} {} {}\n", (v * 3 + 1) % 600, (v + 11) % 600));
            }
        }
        let graph = GraphStore::parse(&text);
        let config = EngineConfig::new(20);

        let expected = SequentialBackend.run(&graph, &config).unwrap();
        let actual = gpu_pagerank(&device, &graph, &config).await.unwrap();

        assert_eq!(actual.supersteps, expected.supersteps);
        assert_close(&actual.ranks, &expected.ranks);
    }

    #[tokio::test]
    async fn test_empty_graph_needs_no_kernels() {
        let Some(device) = device_or_skip("test_empty_graph_needs_no_kernels").await else {
            return;
        };

        let result = gpu_pagerank(&device, &GraphStore::new(), &EngineConfig::new(3))
            .await
            .unwrap();
        assert!(result.ranks.is_empty());
    }
}
