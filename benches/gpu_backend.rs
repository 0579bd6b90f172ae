//! Accelerated backend benchmarks
//!
//! Runs the device superstep loop against the sequential reference on the
//! same graphs. Upload time is measured separately from the superstep loop.
//!
//! Note: These benchmarks require a wgpu adapter and are automatically
//! skipped if none is available.

#![cfg(feature = "gpu")]

use bsp_pagerank::gpu::{gpu_pagerank, DeviceKernelDriver, GpuDevice};
use bsp_pagerank::{EngineConfig, GraphStore, SequentialBackend};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::fmt::Write as _;
use std::hint::black_box;

/// Generate scale-free graph (Barabási-Albert model approximation)
fn generate_scale_free_graph(num_nodes: usize, edges_per_node: usize) -> GraphStore {
    let mut text = String::new();
    let mut rng_state = 12345_u64; // Simple LCG for reproducibility

    for node in 0..num_nodes {
        let _ = write!(text, "v{node}");
        if node % 10 != 9 {
            for _ in 0..edges_per_node {
                rng_state = rng_state.wrapping_mul(1_103_515_245).wrapping_add(12345);
                let target = (rng_state % num_nodes as u64) as usize;
                let _ = write!(text, " v{target}");
            }
        }
        text.push('\n');
    }

    GraphStore::parse(&text)
}

const SUPERSTEPS: usize = 20;

/// Benchmark: accelerated vs sequential PageRank
fn bench_gpu_pagerank(c: &mut Criterion) {
    // Try to create GPU device; skip if unavailable
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let device = match runtime.block_on(GpuDevice::new()) {
        Ok(dev) => dev,
        Err(_) => {
            eprintln!("⚠️  GPU not available - skipping accelerated benchmarks");
            return;
        }
    };

    let mut group = c.benchmark_group("pagerank_comparison");
    group.sample_size(10);
    let config = EngineConfig::new(SUPERSTEPS);

    for size in [1_000, 10_000, 50_000] {
        let graph = generate_scale_free_graph(size, 5);

        group.bench_with_input(BenchmarkId::new("sequential", size), &graph, |b, graph| {
            b.iter(|| black_box(SequentialBackend.run(black_box(graph), &config).unwrap()));
        });

        group.bench_with_input(BenchmarkId::new("accelerated", size), &graph, |b, graph| {
            b.iter(|| {
                runtime.block_on(async {
                    let result = gpu_pagerank(&device, black_box(graph), &config)
                        .await
                        .unwrap();
                    black_box(result);
                });
            });
        });
    }

    group.finish();
}

/// Benchmark: superstep loop only, buffers already resident
fn bench_gpu_supersteps(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let device = match runtime.block_on(GpuDevice::new()) {
        Ok(dev) => dev,
        Err(_) => {
            eprintln!("⚠️  GPU not available - skipping superstep benchmarks");
            return;
        }
    };

    let mut group = c.benchmark_group("gpu_supersteps");
    group.sample_size(10);

    for size in [1_000, 10_000, 50_000] {
        let csr = generate_scale_free_graph(size, 5).to_csr();

        group.bench_with_input(BenchmarkId::new("upload", size), &csr, |b, csr| {
            b.iter(|| {
                runtime.block_on(async {
                    let driver = DeviceKernelDriver::new(&device, black_box(csr)).await.unwrap();
                    black_box(driver.num_nodes());
                });
            });
        });

        let mut driver = runtime
            .block_on(DeviceKernelDriver::new(&device, &csr))
            .unwrap();
        group.bench_function(BenchmarkId::new("superstep", size), |b| {
            b.iter(|| {
                runtime.block_on(async {
                    black_box(driver.superstep().await.unwrap());
                });
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_gpu_pagerank, bench_gpu_supersteps);
criterion_main!(benches);
