use crate::expander::Suggestion;
use crate::graph::Graph;
use crate::types::{Edge, Node, NodeId};

/// Outcome of resolving one suggestion against the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The suggestion denotes a node that already exists (created in any
    /// prior batch, or earlier in this one). `edge_added` is false when
    /// the parent→child link also already existed.
    LinkedExisting { child_id: NodeId, edge_added: bool },

    /// A new node was appended under the parent.
    CreatedNew { node_id: NodeId },

    /// Creating the node would exceed the cap. Nothing was changed; the
    /// caller stops accepting further suggestions from this batch.
    CapExhausted,
}

/// Decides, per suggestion, between linking an existing node and creating
/// a new one, keeping the graph well-formed: global topic uniqueness on
/// the trimmed case-folded key, no duplicate parent→child edges, and the
/// node cap as a hard ceiling checked per creation.
///
/// The decision is a deterministic function of the current graph state —
/// including nodes created earlier in the same batch, so two suggestions
/// that normalize to the same new topic collapse to one node.
#[derive(Debug, Default)]
pub struct MergeResolver;

impl MergeResolver {
    pub fn new() -> Self {
        MergeResolver
    }

    /// Resolve one sanitized suggestion. `order` is the suggestion's
    /// position within its batch, recorded on any created edge. Existing
    /// target nodes are never modified.
    pub fn resolve(
        &self,
        graph: &mut Graph,
        parent: &Node,
        suggestion: &Suggestion,
        order: u32,
        max_nodes: usize,
    ) -> Resolution {
        if let Some(existing_id) = graph.node_id_by_topic(&suggestion.topic).cloned() {
            let edge_added = graph.add_edge(Edge::new(parent.id.clone(), existing_id.clone(), order));
            return Resolution::LinkedExisting {
                child_id: existing_id,
                edge_added,
            };
        }

        if graph.node_count() >= max_nodes {
            return Resolution::CapExhausted;
        }

        let node = Node::child(
            suggestion.topic.clone(),
            parent.id.clone(),
            parent.depth,
            suggestion.importance,
        );
        let node_id = node.id.clone();
        graph
            .insert_node(node)
            .expect("topic index miss guarantees a unique key");
        graph.add_edge(Edge::new(parent.id.clone(), node_id.clone(), order));
        Resolution::CreatedNew { node_id }
    }
}
