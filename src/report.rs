//! Rank output files
//!
//! ```text
//! <elapsed milliseconds>
//! <label> <rank>
//! <label> <rank>
//! ...
//! ```
//!
//! One rank line per vertex, in vertex-id order.

use crate::backends::Backend;
use crate::storage::{GraphStore, VertexId};
use anyhow::{ensure, Context, Result};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default output location, `output/<backend>_<max_supersteps>.txt`
#[must_use]
pub fn default_output_path(backend: Backend, max_supersteps: usize) -> PathBuf {
    PathBuf::from("output").join(format!("{backend}_{max_supersteps}.txt"))
}

/// Render ranks in output format
///
/// # Errors
///
/// Returns error if `ranks` and the graph disagree on the vertex count
#[allow(clippy::cast_possible_truncation)]
pub fn render(graph: &GraphStore, ranks: &[f64], elapsed: Duration) -> Result<String> {
    ensure!(
        ranks.len() == graph.num_vertices(),
        "Rank vector has {} entries for {} vertices",
        ranks.len(),
        graph.num_vertices()
    );

    let mut out = String::with_capacity(16 + ranks.len() * 24);
    let _ = writeln!(out, "{}", elapsed.as_millis());
    for (vertex, rank) in ranks.iter().enumerate() {
        let label = graph
            .label(VertexId(vertex as u32))
            .with_context(|| format!("Vertex {vertex} has no label"))?;
        let _ = writeln!(out, "{label} {rank}");
    }
    Ok(out)
}

/// Write ranks to `path`, creating parent directories as needed
///
/// # Errors
///
/// Returns error if rendering fails or the file cannot be written
pub async fn write_report<P: AsRef<Path>>(
    path: P,
    graph: &GraphStore,
    ranks: &[f64],
    elapsed: Duration,
) -> Result<()> {
    let path = path.as_ref();
    let text = render(graph, ranks, elapsed)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create output directory {}", parent.display()))?;
    }
    tokio::fs::write(path, text)
        .await
        .with_context(|| format!("Failed to write output {}", path.display()))
}
