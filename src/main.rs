use anyhow::{Context, Result};
use bsp_pagerank::report::{default_output_path, write_report};
use bsp_pagerank::{execute, Backend, BackendOptions, EngineConfig, GraphStore};
use clap::Parser;
use log::info;
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(
    name = "bsp-pagerank",
    version,
    about = "Runs bulk-synchronous PageRank over a text edge list.",
    long_about = None,
    after_help = "Environment (default: info):\n\nRUST_LOG: configuration for env_logger, pass `debug` to see every superstep."
)]
struct CliArgs {
    /// Maximum number of supersteps (fewer run if the graph goes quiet).
    max_supersteps: usize,

    /// Superstep backend.
    #[arg(short, long, value_enum, default_value_t = Backend::Sequential)]
    backend: Backend,

    /// Input edge list: one record per line, source label then destination labels.
    #[arg(short, long, default_value = "input/graph.txt")]
    input: PathBuf,

    /// Output file [default: output/<backend>_<max_supersteps>.txt].
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Threads for the shared-memory backend [default: available parallelism].
    #[arg(short = 'j', long)]
    threads: Option<usize>,

    /// Workers for the distributed backend [default: available parallelism].
    #[arg(short, long)]
    workers: Option<usize>,

    /// Write the ingested graph as a Parquet snapshot with this base path.
    #[cfg(feature = "storage")]
    #[arg(long)]
    save_snapshot: Option<PathBuf>,

    /// Read the graph from a Parquet snapshot instead of the text input.
    #[cfg(feature = "storage")]
    #[arg(long, conflicts_with = "input")]
    load_snapshot: Option<PathBuf>,
}

impl CliArgs {
    fn options(&self) -> BackendOptions {
        let defaults = BackendOptions::default();
        BackendOptions {
            threads: self.threads.unwrap_or(defaults.threads),
            workers: self.workers.unwrap_or(defaults.workers),
        }
    }
}

async fn ingest(args: &CliArgs) -> Result<GraphStore> {
    #[cfg(feature = "storage")]
    if let Some(base) = &args.load_snapshot {
        return GraphStore::read_parquet(base).await;
    }

    let graph = GraphStore::load(&args.input).await?;

    #[cfg(feature = "storage")]
    if let Some(base) = &args.save_snapshot {
        graph.write_parquet(base).await?;
        info!("snapshot written to {}", base.display());
    }

    Ok(graph)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = CliArgs::parse();
    let config = EngineConfig::new(args.max_supersteps);

    let graph = ingest(&args).await?;
    info!(
        "loaded {} vertices, {} edges ({} dangling)",
        graph.num_vertices(),
        graph.num_edges(),
        graph.dangling_count()
    );

    let start = Instant::now();
    let result = execute(args.backend, &graph, &config, &args.options())
        .await
        .with_context(|| format!("{} backend failed", args.backend))?;
    let elapsed = start.elapsed();

    println!("Execution time: {} ms", elapsed.as_millis());

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(args.backend, args.max_supersteps));
    write_report(&output, &graph, &result.ranks, elapsed).await?;
    info!(
        "{} supersteps (quiesced={}), ranks written to {}",
        result.supersteps,
        result.quiesced,
        output.display()
    );

    Ok(())
}
