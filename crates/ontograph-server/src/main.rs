mod config;
mod expander;
mod http;
mod serve;
mod viz;

use clap::Parser;
use config::{BuildArgs, Cli, Command, ExportArgs};
use expander::ChatExpander;
use ontograph_core::{export, ExpansionEngine, GraphStore, NullChannel};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Serve(args) => serve::run(args).await,
        Command::Build(args) => run_build(args).await,
        Command::Export(args) => run_export(args),
    }
}

/// Headless run: no observers, no pacing, same engine.
async fn run_build(args: BuildArgs) -> anyhow::Result<()> {
    args.graph.validate()?;

    let store = GraphStore::new(&args.graph.graph);
    let expander = ChatExpander::from_args(&args.expander)?;
    let engine = ExpansionEngine::new(
        store.clone(),
        expander,
        Arc::new(NullChannel),
        args.graph.engine_config_headless(),
    );

    let mut graph = store.load();
    info!(
        "graph loaded: {} nodes, {} pending",
        graph.node_count(),
        graph.pending_count()
    );

    let summary = engine.run(&mut graph).await?;
    println!(
        "Processed {} nodes, created {} ({:?}). {} nodes total in {}",
        summary.nodes_processed,
        summary.nodes_created,
        summary.stop,
        graph.node_count(),
        args.graph.graph.display()
    );
    Ok(())
}

fn run_export(args: ExportArgs) -> anyhow::Result<()> {
    let graph = GraphStore::new(&args.graph).load();
    if graph.is_empty() {
        anyhow::bail!("no graph found at {}", args.graph.display());
    }
    if let Some(dir) = args.out.parent() {
        if !dir.as_os_str().is_empty() && !dir.exists() {
            std::fs::create_dir_all(dir)?;
        }
    }
    let rows = export::write_csv(&graph, &args.out)?;
    println!("Wrote {} rows to {}", rows, args.out.display());
    Ok(())
}
