//! GPU device initialization and management
//!
//! Handles wgpu adapter selection (hardware first, then the platform's
//! software fallback), device creation and buffer allocation.

use log::info;
use thiserror::Error;
use wgpu::util::DeviceExt;

/// GPU device initialization errors
#[derive(Debug, Error)]
pub enum GpuDeviceError {
    /// Neither a hardware nor a fallback adapter was found
    #[error("No compatible GPU adapter found")]
    NoAdapter,

    /// Failed to request GPU device
    #[error("Failed to request GPU device: {0}")]
    DeviceRequest(String),

    /// WGSL compilation or pipeline validation failed; holds the full diagnostic
    #[error("Kernel build failed:\n{0}")]
    ShaderBuild(String),

    /// The device could not allocate a buffer
    #[error("GPU buffer allocation failed: {0}")]
    BufferAllocation(String),

    /// One thread per vertex needs more workgroups than the device dispatches
    #[error("{vertices} vertices need {workgroups} workgroups, device limit is {limit}")]
    DispatchTooLarge {
        /// Vertices in the graph
        vertices: usize,
        /// Workgroups required
        workgroups: usize,
        /// `max_compute_workgroups_per_dimension`
        limit: u32,
    },
}

/// GPU device wrapper for superstep kernels
///
/// # Example
///
/// ```ignore
/// # use bsp_pagerank::gpu::GpuDevice;
/// let device = GpuDevice::new().await?;
/// println!("running on {}", device.info().name);
/// ```
#[derive(Debug)]
pub struct GpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    adapter: wgpu::Adapter,
}

impl GpuDevice {
    /// Check if GPU is available without keeping a device
    ///
    /// This is useful for tests to skip gracefully when GPU is not available.
    pub async fn is_gpu_available() -> bool {
        Self::new().await.is_ok()
    }

    /// Initialize GPU device with default settings
    ///
    /// # Errors
    ///
    /// Returns `GpuDeviceError` if:
    /// - No compatible adapter found, hardware or fallback
    /// - Device request fails
    pub async fn new() -> Result<Self, GpuDeviceError> {
        Self::new_with_backend(wgpu::Backends::all()).await
    }

    /// Initialize GPU device with specific backend
    ///
    /// # Errors
    ///
    /// Returns `GpuDeviceError` if device initialization fails
    pub async fn new_with_backend(backends: wgpu::Backends) -> Result<Self, GpuDeviceError> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends,
            ..Default::default()
        });

        // Hardware adapter first, software fallback second
        let mut adapter = None;
        for force_fallback_adapter in [false, true] {
            adapter = instance
                .request_adapter(&wgpu::RequestAdapterOptions {
                    power_preference: wgpu::PowerPreference::HighPerformance,
                    compatible_surface: None,
                    force_fallback_adapter,
                })
                .await;
            if adapter.is_some() {
                break;
            }
        }
        let adapter = adapter.ok_or(GpuDeviceError::NoAdapter)?;

        let info = adapter.get_info();
        info!(
            "selected adapter {} ({:?}, {:?})",
            info.name, info.backend, info.device_type
        );

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("bsp-pagerank device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: wgpu::MemoryHints::default(),
                },
                None,
            )
            .await
            .map_err(|e| GpuDeviceError::DeviceRequest(e.to_string()))?;

        Ok(Self {
            device,
            queue,
            adapter,
        })
    }

    /// Whether the adapter is a software (CPU) implementation
    #[must_use]
    pub fn is_fallback(&self) -> bool {
        self.info().device_type == wgpu::DeviceType::Cpu
    }

    /// Get adapter info (GPU name, backend, etc.)
    #[must_use]
    pub fn info(&self) -> wgpu::AdapterInfo {
        self.adapter.get_info()
    }

    /// Create GPU buffer with initial data
    ///
    /// # Errors
    ///
    /// Returns [`GpuDeviceError::BufferAllocation`] if the device reports
    /// out-of-memory
    pub async fn create_buffer_init(
        &self,
        label: &str,
        contents: &[u8],
        usage: wgpu::BufferUsages,
    ) -> Result<wgpu::Buffer, GpuDeviceError> {
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents,
                usage,
            });
        self.allocation_result(label, buffer).await
    }

    /// Create empty GPU buffer
    ///
    /// # Errors
    ///
    /// Returns [`GpuDeviceError::BufferAllocation`] if the device reports
    /// out-of-memory
    pub async fn create_buffer(
        &self,
        label: &str,
        size: u64,
        usage: wgpu::BufferUsages,
    ) -> Result<wgpu::Buffer, GpuDeviceError> {
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage,
            mapped_at_creation: false,
        });
        self.allocation_result(label, buffer).await
    }

    async fn allocation_result(
        &self,
        label: &str,
        buffer: wgpu::Buffer,
    ) -> Result<wgpu::Buffer, GpuDeviceError> {
        match self.device.pop_error_scope().await {
            Some(error) => Err(GpuDeviceError::BufferAllocation(format!("{label}: {error}"))),
            None => Ok(buffer),
        }
    }

    /// Get device reference
    #[must_use]
    pub const fn device(&self) -> &wgpu::Device {
        &self.device
    }

    /// Get queue reference
    #[must_use]
    pub const fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }
}
