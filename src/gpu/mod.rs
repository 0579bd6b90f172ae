//! GPU acceleration for superstep execution
//!
//! # Architecture
//!
//! - `device`: wgpu adapter selection (with software fallback) and buffer allocation
//! - `buffer`: CSR upload
//! - `driver`: [`DeviceKernelDriver`], the three superstep kernels and [`gpu_pagerank`]
//! - `shaders/pagerank.wgsl`: the kernel module
//!
//! # Feature Flag
//!
//! This module is only available with the `gpu` feature flag:
//! ```bash
//! cargo build --features gpu
//! ```

mod buffer;
mod device;
mod driver;

pub use buffer::GpuCsrBuffers;
pub use device::{GpuDevice, GpuDeviceError};
pub use driver::{gpu_pagerank, DeviceKernelDriver};
