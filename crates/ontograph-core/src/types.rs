use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Type alias for node identifiers.
///
/// Ids are opaque string tokens: the root is always `"root"`, every other
/// node gets an 8-hex-char UUIDv4 prefix at creation time. Short ids keep
/// the persisted artifact and the wire events compact.
pub type NodeId = String;

/// Fixed id of the single root node.
pub const ROOT_ID: &str = "root";

/// Default topic label for a freshly bootstrapped root.
pub const DEFAULT_ROOT_TOPIC: &str = "Knowledge";

/// Default edge relation tag.
pub const DEFAULT_RELATION: &str = "is_a";

/// Mint a fresh node id.
pub fn new_node_id() -> NodeId {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// Expansion state of a node.
///
/// Transitions are monotonic and terminal: `Pending` moves to exactly one of
/// `Expanded` or `Skipped` and never changes again. The wire encoding
/// (`"false"` / `"true"` / `"skipped"`) is part of the persisted-artifact
/// contract and must not change.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum NodeState {
    /// Not yet processed by the engine.
    #[serde(rename = "false")]
    Pending,

    /// The capability was asked and returned at least one suggestion.
    #[serde(rename = "true")]
    Expanded,

    /// Finalized without children: gated out, empty response, or
    /// capability failure.
    #[serde(rename = "skipped")]
    Skipped,
}

impl std::fmt::Display for NodeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeState::Pending => write!(f, "pending"),
            NodeState::Expanded => write!(f, "expanded"),
            NodeState::Skipped => write!(f, "skipped"),
        }
    }
}

/// A topic node in the graph.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Stable opaque token, globally unique within one graph.
    pub id: NodeId,

    /// Display label. Non-empty; uniqueness is enforced on the trimmed,
    /// case-folded form.
    pub topic: String,

    /// Parent recorded at creation time. `None` only for the root.
    /// Used for depth and hierarchy paths; later dedup links do not
    /// change it.
    pub primary_parent_id: Option<NodeId>,

    /// Expansion state. Serialized as `"false"` / `"true"` / `"skipped"`.
    pub state: NodeState,

    /// Distance from the root along primary-parent links.
    pub depth: u32,

    /// Importance score (0-10). Nodes below the gating threshold are
    /// skipped without ever calling the capability.
    pub importance: u8,
}

/// A parent→child relationship.
///
/// The graph is a DAG: a node may be linked under several parents, but only
/// the primary-parent edge recorded on the node itself contributes to depth
/// and hierarchy paths.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub parent_id: NodeId,

    pub child_id: NodeId,

    /// Relation tag. Always `"is_a"` in the reference policy.
    pub relation: String,

    /// Position of the originating suggestion within its batch. Preserves
    /// suggestion ordering for tie-breaks and display.
    pub order: u32,
}

impl Node {
    /// Create a child node under the given parent. Importance is clamped
    /// to [0, 10].
    pub fn child(topic: impl Into<String>, parent_id: NodeId, parent_depth: u32, importance: u8) -> Self {
        Node {
            id: new_node_id(),
            topic: topic.into(),
            primary_parent_id: Some(parent_id),
            state: NodeState::Pending,
            depth: parent_depth + 1,
            importance: importance.min(10),
        }
    }

    /// Create the root node. Fixed id, depth 0, maximum importance so the
    /// gate can never skip it.
    pub fn root(topic: impl Into<String>) -> Self {
        Node {
            id: ROOT_ID.to_string(),
            topic: topic.into(),
            primary_parent_id: None,
            state: NodeState::Pending,
            depth: 0,
            importance: 10,
        }
    }

    pub fn is_root(&self) -> bool {
        self.primary_parent_id.is_none()
    }
}

impl Edge {
    pub fn new(parent_id: NodeId, child_id: NodeId, order: u32) -> Self {
        Edge {
            parent_id,
            child_id,
            relation: DEFAULT_RELATION.to_string(),
            order,
        }
    }
}

/// Normalization applied before any topic comparison: trimmed and
/// case-folded. Two topics with the same key denote the same node.
pub fn topic_key(topic: &str) -> String {
    topic.trim().to_lowercase()
}
