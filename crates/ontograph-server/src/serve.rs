use crate::config::ServeArgs;
use crate::expander::ChatExpander;
use crate::http::{create_router, AppState};
use ontograph_core::{BroadcastChannel, ExpansionEngine, GraphStore, LiveChannel};
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Event buffer per observer; laggards skip ahead rather than slow the
/// engine down.
const CHANNEL_CAPACITY: usize = 1024;

pub async fn run(args: ServeArgs) -> anyhow::Result<()> {
    args.graph.validate()?;

    let store = GraphStore::new(&args.graph.graph);
    let channel = Arc::new(BroadcastChannel::new(CHANNEL_CAPACITY));
    let expander = ChatExpander::from_args(&args.expander)?;

    info!("Starting ontograph v{}", env!("CARGO_PKG_VERSION"));
    info!("HTTP: {}", args.http_addr);
    info!("Graph: {}", args.graph.graph.display());

    // Single writer: exactly one engine run owns the graph for the
    // lifetime of the server. Observers attach and detach freely.
    let engine_task = {
        let store = store.clone();
        let sink: Arc<dyn LiveChannel> = channel.clone();
        let config = args.graph.engine_config();
        tokio::spawn(async move {
            let mut graph = store.load();
            info!(
                "graph loaded: {} nodes, {} edges, {} pending",
                graph.node_count(),
                graph.edge_count(),
                graph.pending_count()
            );
            let engine = ExpansionEngine::new(store, expander, sink, config);
            match engine.run(&mut graph).await {
                Ok(summary) => info!(
                    "expansion finished: {} processed, {} created ({:?})",
                    summary.nodes_processed, summary.nodes_created, summary.stop
                ),
                Err(e) => error!("expansion run failed: {e}"),
            }
        })
    };

    let state = AppState {
        store,
        channel,
        start_time: Instant::now(),
    };
    let app = create_router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(args.http_addr).await?;
    info!("ontograph ready on http://{}", args.http_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received, terminating...");
        })
        .await?;

    engine_task.abort();
    Ok(())
}
