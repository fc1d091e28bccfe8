use crate::error::{OntographError, Result};
use crate::types::{topic_key, Edge, Node, NodeId, NodeState};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};

/// The owned in-memory graph aggregate.
///
/// Nodes and edges are append-only and kept in creation order; only a
/// node's `state` is ever mutated. All derived lookups (id index,
/// normalized-topic index, parent→child edge set, Pending queue) are
/// maintained on every append, so the engine never rescans the node list.
///
/// A single engine run owns the aggregate mutably for its whole lifetime;
/// observers only ever see serialized snapshots of it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "GraphSnapshot", into = "GraphSnapshot")]
pub struct Graph {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    id_index: HashMap<NodeId, usize>,
    topic_index: HashMap<String, NodeId>,
    edge_set: HashSet<(NodeId, NodeId)>,
    /// Pending node ids in creation order. Nodes never revert to Pending,
    /// so a FIFO pop is equivalent to the first-Pending scan over the
    /// node list.
    pending: VecDeque<NodeId>,
}

/// Persisted shape of a graph: just the node and edge lists. Indexes are
/// rebuilt on load.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct GraphSnapshot {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Graph {
    pub fn new() -> Self {
        Graph {
            nodes: Vec::new(),
            edges: Vec::new(),
            id_index: HashMap::new(),
            topic_index: HashMap::new(),
            edge_set: HashSet::new(),
            pending: VecDeque::new(),
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes in creation order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Edges in creation order.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.id_index.get(id).map(|&i| &self.nodes[i])
    }

    /// Resolve a topic to an existing node id via the normalized key.
    pub fn node_id_by_topic(&self, topic: &str) -> Option<&NodeId> {
        self.topic_index.get(&topic_key(topic))
    }

    /// Create the root node if the graph is empty. Returns the root node
    /// when it was just created.
    pub fn ensure_root(&mut self, topic: &str) -> Option<Node> {
        if !self.is_empty() {
            return None;
        }
        let root = Node::root(topic);
        self.insert_node(root.clone())
            .expect("empty graph accepts the root");
        Some(root)
    }

    /// Append a node, maintaining every index. Rejects duplicate ids and
    /// topics that normalize to an existing key.
    pub fn insert_node(&mut self, node: Node) -> Result<()> {
        if self.id_index.contains_key(&node.id) {
            return Err(OntographError::Validation(format!(
                "duplicate node id: {}",
                node.id
            )));
        }
        let key = topic_key(&node.topic);
        if key.is_empty() {
            return Err(OntographError::Validation("empty topic".to_string()));
        }
        if self.topic_index.contains_key(&key) {
            return Err(OntographError::Validation(format!(
                "duplicate topic: {}",
                node.topic
            )));
        }
        self.id_index.insert(node.id.clone(), self.nodes.len());
        self.topic_index.insert(key, node.id.clone());
        if node.state == NodeState::Pending {
            self.pending.push_back(node.id.clone());
        }
        self.nodes.push(node);
        Ok(())
    }

    /// Append an edge unless an identical parent→child link already
    /// exists. Returns whether the edge was added.
    pub fn add_edge(&mut self, edge: Edge) -> bool {
        let pair = (edge.parent_id.clone(), edge.child_id.clone());
        if !self.edge_set.insert(pair) {
            return false;
        }
        self.edges.push(edge);
        true
    }

    pub fn has_edge(&self, parent_id: &str, child_id: &str) -> bool {
        self.edge_set
            .contains(&(parent_id.to_string(), child_id.to_string()))
    }

    /// Pop the oldest Pending node. The caller finalizes its state before
    /// asking for the next one.
    pub fn next_pending(&mut self) -> Option<Node> {
        let id = self.pending.pop_front()?;
        self.node(&id).cloned()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Transition a node out of Pending. States are terminal: a second
    /// transition attempt on the same node is rejected.
    pub fn set_state(&mut self, id: &str, state: NodeState) -> Result<()> {
        let idx = *self.id_index.get(id).ok_or_else(|| {
            OntographError::Validation(format!("unknown node id: {id}"))
        })?;
        let node = &mut self.nodes[idx];
        if node.state != NodeState::Pending {
            return Err(OntographError::Validation(format!(
                "node {id} already finalized as {}",
                node.state
            )));
        }
        node.state = state;
        Ok(())
    }

    /// Topic labels from the root to the given node along primary-parent
    /// links, root first.
    pub fn hierarchy(&self, id: &str) -> Vec<String> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut current = self.node(id);
        while let Some(node) = current {
            if !seen.insert(node.id.clone()) {
                break;
            }
            chain.push(node.topic.clone());
            current = node
                .primary_parent_id
                .as_deref()
                .and_then(|pid| self.node(pid));
        }
        chain.reverse();
        chain
    }
}

impl From<GraphSnapshot> for Graph {
    fn from(snapshot: GraphSnapshot) -> Self {
        let mut graph = Graph::new();
        for node in snapshot.nodes {
            // Later duplicates lose, matching first-wins index semantics.
            let _ = graph.insert_node(node);
        }
        for edge in snapshot.edges {
            graph.add_edge(edge);
        }
        graph
    }
}

impl From<Graph> for GraphSnapshot {
    fn from(graph: Graph) -> Self {
        GraphSnapshot {
            nodes: graph.nodes,
            edges: graph.edges,
        }
    }
}
