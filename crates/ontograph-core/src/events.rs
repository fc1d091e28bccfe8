use crate::types::{Edge, Node, NodeId};
use serde_json::{json, Value};
use tokio::sync::broadcast;

/// Everything the engine tells observers about the graph's growth.
///
/// The event names are the wire contract of the live channel; hosting
/// layers relay them verbatim.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphEvent {
    /// Full node-list snapshot, once at run start.
    ExistingNodes(Vec<Node>),

    /// Full edge-list snapshot, once at run start. Never emitted when the
    /// graph has no edges.
    ExistingEdges(Vec<Edge>),

    /// A node entering processing.
    UpdateNode(Node),

    /// One per node created during a batch.
    NewNode(Node),

    /// One per edge created during a batch.
    NewEdge { from: NodeId, to: NodeId },

    /// Exactly once per processed node, after its deltas. `children` lists
    /// the ids of nodes created in the batch and may be empty.
    BatchReady {
        parent_id: NodeId,
        children: Vec<NodeId>,
    },
}

impl GraphEvent {
    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            GraphEvent::ExistingNodes(_) => "existing_nodes",
            GraphEvent::ExistingEdges(_) => "existing_edges",
            GraphEvent::UpdateNode(_) => "update_node",
            GraphEvent::NewNode(_) => "new_node",
            GraphEvent::NewEdge { .. } => "new_edge",
            GraphEvent::BatchReady { .. } => "batch_ready",
        }
    }

    /// Wire payload of the event.
    pub fn payload(&self) -> Value {
        match self {
            GraphEvent::ExistingNodes(nodes) => json!(nodes),
            GraphEvent::ExistingEdges(edges) => json!(edges),
            GraphEvent::UpdateNode(node) => json!(node),
            GraphEvent::NewNode(node) => json!(node),
            GraphEvent::NewEdge { from, to } => json!({ "from": from, "to": to }),
            GraphEvent::BatchReady { parent_id, children } => {
                json!({ "parentId": parent_id, "children": children })
            }
        }
    }

    /// Complete wire frame: `{"event": <name>, "data": <payload>}`.
    pub fn to_wire(&self) -> Value {
        json!({ "event": self.name(), "data": self.payload() })
    }
}

/// Push-only, best-effort broadcast sink.
///
/// No acknowledgment, no delivery guarantee, no queuing contract beyond
/// "deliver now to whoever is listening". The engine never waits on
/// observers; slow or disconnected ones simply miss events.
pub trait LiveChannel: Send + Sync {
    fn emit(&self, event: GraphEvent);
}

/// Fan-out channel over `tokio::sync::broadcast`. Receivers that fall more
/// than `capacity` events behind are lagged past the gap, which is exactly
/// the contract above.
pub struct BroadcastChannel {
    tx: broadcast::Sender<GraphEvent>,
}

impl BroadcastChannel {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        BroadcastChannel { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GraphEvent> {
        self.tx.subscribe()
    }

    pub fn observer_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl LiveChannel for BroadcastChannel {
    fn emit(&self, event: GraphEvent) {
        // A send with zero receivers is not an error here.
        let _ = self.tx.send(event);
    }
}

/// Sink for headless runs: every event is dropped.
pub struct NullChannel;

impl LiveChannel for NullChannel {
    fn emit(&self, _event: GraphEvent) {}
}
