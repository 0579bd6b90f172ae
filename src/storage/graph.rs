//! Ingested graph: dense vertex ids, label tables and out-edge sequences
//!
//! # Input Format
//!
//! ```text
//! A B C      // A → B, A → C
//! B C        // B → C
//! C A        // C → A
//! D          // D declared with no outgoing edges (dangling)
//! ```
//!
//! Ids are handed out in first-seen order, scanning each record left to right.
//! Destinations that never appear as a source still get an (empty) out-edge
//! slot, so they are dangling.

use super::CsrGraph;
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;

/// Vertex identifier (dense, zero-indexed, first-seen order)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertexId(pub u32);

impl VertexId {
    /// Index into per-vertex arrays
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Read-only graph store built once by ingestion
///
/// Out-edges are kept as one sequence per vertex. Duplicate destinations and
/// self-loops are preserved verbatim, so a vertex's share is split over its
/// full out-degree.
///
/// # Example
///
/// ```
/// use bsp_pagerank::{GraphStore, VertexId};
///
/// let graph = GraphStore::parse("A B C\nB C\nC A\n");
///
/// assert_eq!(graph.num_vertices(), 3);
/// assert_eq!(graph.out_edges(VertexId(0)), &[1, 2]);
/// assert_eq!(graph.label(VertexId(2)), Some("C"));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphStore {
    /// label → id (append-only)
    ids: HashMap<String, u32>,

    /// id → label (append-only)
    labels: Vec<String>,

    /// Per-vertex destination ids, in input order
    out_edges: Vec<Vec<u32>>,

    num_edges: usize,
}

impl GraphStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up `label`, assigning the next dense id if it is new
    ///
    /// A newly assigned vertex starts with an empty out-edge slot.
    #[allow(clippy::cast_possible_truncation)] // Graphs >4B vertices not supported
    pub fn vertex_id(&mut self, label: &str) -> VertexId {
        if let Some(&id) = self.ids.get(label) {
            return VertexId(id);
        }

        let id = self.labels.len() as u32;
        self.ids.insert(label.to_string(), id);
        self.labels.push(label.to_string());
        self.out_edges.push(Vec::new());
        VertexId(id)
    }

    /// Ingest one record: a source label followed by destination labels
    ///
    /// Returns the source id, or `None` for an empty record.
    pub fn add_record<'a, I>(&mut self, tokens: I) -> Option<VertexId>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut tokens = tokens.into_iter();
        let source = self.vertex_id(tokens.next()?);

        for token in tokens {
            let target = self.vertex_id(token);
            self.push_edge(source, target);
        }

        Some(source)
    }

    /// Append `src → dst`; both ids must already be assigned
    pub(crate) fn push_edge(&mut self, src: VertexId, dst: VertexId) {
        self.out_edges[src.index()].push(dst.0);
        self.num_edges += 1;
    }

    /// Ingest one whitespace-separated text line (blank lines are skipped)
    pub fn add_line(&mut self, line: &str) -> Option<VertexId> {
        self.add_record(line.split_whitespace())
    }

    /// Parse a whole text document
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut graph = Self::new();
        for line in text.lines() {
            graph.add_line(line);
        }
        graph
    }

    /// Ingest records from a buffered reader
    ///
    /// # Errors
    ///
    /// Returns error if reading a line fails (including invalid UTF-8)
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut graph = Self::new();
        for (lineno, line) in reader.lines().enumerate() {
            let line = line.with_context(|| format!("Failed to read input line {}", lineno + 1))?;
            graph.add_line(&line);
        }
        Ok(graph)
    }

    /// Load a text graph from disk
    ///
    /// An unreadable path is an error, never an empty graph.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read graph input {}", path.display()))?;
        Ok(Self::parse(&text))
    }

    /// Number of vertices (n)
    #[must_use]
    pub fn num_vertices(&self) -> usize {
        self.labels.len()
    }

    /// Number of edges, duplicates included
    #[must_use]
    pub const fn num_edges(&self) -> usize {
        self.num_edges
    }

    /// Destination ids of `vertex`
    ///
    /// # Panics
    ///
    /// Panics if `vertex` is out of range
    #[must_use]
    pub fn out_edges(&self, vertex: VertexId) -> &[u32] {
        &self.out_edges[vertex.index()]
    }

    /// Out-degree of `vertex`
    #[must_use]
    pub fn out_degree(&self, vertex: VertexId) -> usize {
        self.out_edges(vertex).len()
    }

    /// Whether `vertex` has no outgoing edges
    #[must_use]
    pub fn is_dangling(&self, vertex: VertexId) -> bool {
        self.out_edges(vertex).is_empty()
    }

    /// Number of dangling vertices
    #[must_use]
    pub fn dangling_count(&self) -> usize {
        self.out_edges.iter().filter(|edges| edges.is_empty()).count()
    }

    /// All out-edge sequences, indexed by vertex id
    #[must_use]
    pub fn adjacency(&self) -> &[Vec<u32>] {
        &self.out_edges
    }

    /// Label of `vertex`
    #[must_use]
    pub fn label(&self, vertex: VertexId) -> Option<&str> {
        self.labels.get(vertex.index()).map(String::as_str)
    }

    /// Id previously assigned to `label`
    #[must_use]
    pub fn id_of(&self, label: &str) -> Option<VertexId> {
        self.ids.get(label).copied().map(VertexId)
    }

    /// Labels in vertex-id order
    #[must_use]
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Build the contiguous CSR form used by the accelerated backend
    #[must_use]
    pub fn to_csr(&self) -> CsrGraph {
        CsrGraph::from_adjacency(&self.out_edges)
    }
}
