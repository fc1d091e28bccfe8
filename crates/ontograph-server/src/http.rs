use crate::viz::GRAPH_VIZ_HTML;
use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::State,
    response::{Html, IntoResponse, Json},
    routing::get,
    Router,
};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use ontograph_core::{BroadcastChannel, GraphEvent, GraphStore};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;

#[derive(Clone)]
pub struct AppState {
    pub store: GraphStore,
    pub channel: Arc<BroadcastChannel>,
    pub start_time: Instant,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(graph_viz))
        .route("/viz", get(graph_viz))
        .route("/health", get(health))
        .route("/graph/export", get(graph_export))
        .route("/ws", get(ws_upgrade))
        .with_state(state)
}

async fn graph_viz() -> Html<&'static str> {
    Html(GRAPH_VIZ_HTML)
}

#[derive(Serialize)]
struct HealthResponse {
    healthy: bool,
    version: String,
    uptime_seconds: u64,
    node_count: usize,
    edge_count: usize,
    pending_count: usize,
    observer_count: usize,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    // Snapshot re-read: the engine owns the live graph, observers read
    // the persisted artifact.
    let graph = state.store.load();
    Json(HealthResponse {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        node_count: graph.node_count(),
        edge_count: graph.edge_count(),
        pending_count: graph.pending_count(),
        observer_count: state.channel.observer_count(),
    })
}

async fn graph_export(State(state): State<AppState>) -> Json<serde_json::Value> {
    let graph = state.store.load();
    Json(serde_json::json!({
        "nodes": graph.nodes(),
        "edges": graph.edges(),
    }))
}

async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| relay(socket, state))
}

/// Relay for one observer: replay the persisted snapshot so late joiners
/// see the current graph (the viz dedupes by id), then forward live
/// events. A receiver that lags simply skips ahead — the engine never
/// waits on observers.
async fn relay(socket: WebSocket, state: AppState) {
    let mut rx = state.channel.subscribe();
    let (mut sender, mut receiver) = socket.split();

    let mut send_task = tokio::spawn(async move {
        let graph = state.store.load();
        let mut replay = vec![GraphEvent::ExistingNodes(graph.nodes().to_vec())];
        if graph.edge_count() > 0 {
            replay.push(GraphEvent::ExistingEdges(graph.edges().to_vec()));
        }
        for event in replay {
            if send_event(&mut sender, &event).await.is_err() {
                return;
            }
        }

        loop {
            match rx.recv().await {
                Ok(event) => {
                    if send_event(&mut sender, &event).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    debug!("observer lagged, skipped {missed} events");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    // Observers are read-only; inbound traffic only matters for detecting
    // a close.
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = receiver.next().await {
            if matches!(message, Message::Close(_)) {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }
}

async fn send_event(
    sender: &mut SplitSink<WebSocket, Message>,
    event: &GraphEvent,
) -> Result<(), axum::Error> {
    sender.send(Message::Text(event.to_wire().to_string())).await
}
