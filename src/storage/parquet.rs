//! Parquet snapshots of ingested graphs
//!
//! Based on `DuckDB` (Raasveldt et al., SIGMOD 2019) columnar storage patterns.
//!
//! # Format
//!
//! A snapshot is stored as two Parquet files:
//! - `{path}_vertices.parquet`: (`vertex_id`, label)
//! - `{path}_edges.parquet`: (source, target), in adjacency order
//!
//! Reloading a snapshot reproduces the exact id assignment and edge order, so
//! ranks computed from a snapshot match ranks computed from the original text.

use super::{GraphStore, VertexId};
use anyhow::{anyhow, Context, Result};
use arrow::array::{StringArray, UInt32Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::arrow_writer::ArrowWriter;
use parquet::file::properties::WriterProperties;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

impl GraphStore {
    /// Write a snapshot of this graph to Parquet files
    ///
    /// Batches are built on the caller; file I/O runs on tokio's blocking pool.
    ///
    /// # Errors
    ///
    /// Returns error if file I/O fails or Arrow conversion fails
    pub async fn write_parquet<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let base_path = path.as_ref();
        let vertices = (vertices_path(base_path), self.vertices_batch()?);
        let edges = (edges_path(base_path), self.edges_batch()?);

        tokio::task::spawn_blocking(move || {
            write_batch(&vertices.0, &vertices.1)?;
            write_batch(&edges.0, &edges.1)
        })
        .await
        .context("Snapshot writer task failed")?
    }

    /// Read a snapshot written by [`GraphStore::write_parquet`]
    ///
    /// # Errors
    ///
    /// Returns error if files don't exist, Arrow conversion fails, or the
    /// snapshot is inconsistent (sparse ids, duplicate labels, dangling edge
    /// endpoints)
    pub async fn read_parquet<P: AsRef<Path>>(path: P) -> Result<Self> {
        let base_path = path.as_ref().to_path_buf();
        let (mut vertices, edges) = tokio::task::spawn_blocking(move || -> Result<_> {
            Ok((
                read_vertices_parquet(&base_path)?,
                read_edges_parquet(&base_path)?,
            ))
        })
        .await
        .context("Snapshot reader task failed")??;

        vertices.sort_unstable_by_key(|(id, _)| *id);

        let mut graph = Self::new();
        for (expected, (id, label)) in vertices.iter().enumerate() {
            if id.index() != expected {
                return Err(anyhow!(
                    "Snapshot vertex ids are not dense: expected {expected}, found {}",
                    id.0
                ));
            }
            if graph.vertex_id(label) != *id {
                return Err(anyhow!("Snapshot label {label:?} is duplicated"));
            }
        }

        let num_vertices = graph.num_vertices();
        for (src, dst) in edges {
            if src.index() >= num_vertices || dst.index() >= num_vertices {
                return Err(anyhow!(
                    "Snapshot edge {} → {} references an unknown vertex",
                    src.0,
                    dst.0
                ));
            }
            graph.push_edge(src, dst);
        }

        Ok(graph)
    }

    fn vertices_batch(&self) -> Result<RecordBatch> {
        #[allow(clippy::cast_possible_truncation)] // Graphs >4B vertices not supported yet
        let vertex_ids: Vec<u32> = (0..self.num_vertices()).map(|v| v as u32).collect();
        let labels: Vec<&str> = self.labels().iter().map(String::as_str).collect();

        let schema = Arc::new(Schema::new(vec![
            Field::new("vertex_id", DataType::UInt32, false),
            Field::new("label", DataType::Utf8, false),
        ]));

        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(UInt32Array::from(vertex_ids)),
                Arc::new(StringArray::from(labels)),
            ],
        )
        .context("Failed to create vertices RecordBatch")
    }

    fn edges_batch(&self) -> Result<RecordBatch> {
        // Flatten adjacency in vertex order so reload preserves edge order
        let mut sources = Vec::with_capacity(self.num_edges());
        let mut targets = Vec::with_capacity(self.num_edges());

        for (src, neighbors) in self.adjacency().iter().enumerate() {
            #[allow(clippy::cast_possible_truncation)]
            let src_u32 = src as u32;
            for &dst in neighbors {
                sources.push(src_u32);
                targets.push(dst);
            }
        }

        let schema = Arc::new(Schema::new(vec![
            Field::new("source", DataType::UInt32, false),
            Field::new("target", DataType::UInt32, false),
        ]));

        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(UInt32Array::from(sources)),
                Arc::new(UInt32Array::from(targets)),
            ],
        )
        .context("Failed to create edges RecordBatch")
    }
}

fn vertices_path(base_path: &Path) -> String {
    format!("{}_vertices.parquet", base_path.display())
}

fn edges_path(base_path: &Path) -> String {
    format!("{}_edges.parquet", base_path.display())
}

fn read_vertices_parquet(base_path: &Path) -> Result<Vec<(VertexId, String)>> {
    let vertices_path = vertices_path(base_path);

    let file =
        File::open(&vertices_path).with_context(|| format!("Failed to open {vertices_path}"))?;

    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;

    let mut vertices = Vec::new();

    for batch_result in reader {
        let batch: RecordBatch = batch_result?;

        let vertex_ids = batch
            .column(0)
            .as_any()
            .downcast_ref::<UInt32Array>()
            .context("Invalid vertex_id column type")?;

        let labels = batch
            .column(1)
            .as_any()
            .downcast_ref::<StringArray>()
            .context("Invalid label column type")?;

        for i in 0..batch.num_rows() {
            vertices.push((VertexId(vertex_ids.value(i)), labels.value(i).to_string()));
        }
    }

    Ok(vertices)
}

fn read_edges_parquet(base_path: &Path) -> Result<Vec<(VertexId, VertexId)>> {
    let edges_path = edges_path(base_path);

    let file = File::open(&edges_path).with_context(|| format!("Failed to open {edges_path}"))?;

    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;

    let mut edges = Vec::new();

    for batch_result in reader {
        let batch: RecordBatch = batch_result?;

        let sources = batch
            .column(0)
            .as_any()
            .downcast_ref::<UInt32Array>()
            .context("Invalid source column type")?;

        let targets = batch
            .column(1)
            .as_any()
            .downcast_ref::<UInt32Array>()
            .context("Invalid target column type")?;

        for i in 0..batch.num_rows() {
            edges.push((VertexId(sources.value(i)), VertexId(targets.value(i))));
        }
    }

    Ok(edges)
}

fn write_batch(path: &str, batch: &RecordBatch) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Failed to create {path}"))?;

    let props = WriterProperties::builder()
        .set_compression(parquet::basic::Compression::ZSTD(
            parquet::basic::ZstdLevel::try_new(3)?,
        ))
        .build();

    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
    writer.write(batch)?;
    writer.close()?;

    Ok(())
}
