use crate::error::Result;
use crate::graph::Graph;
use serde::Serialize;
use std::path::Path;

/// Flat reporting projection of one node: its id, label, root-to-node
/// topic path, and depth.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TopicRow {
    pub id: String,
    pub topic: String,
    /// Topic labels from the root to this node along primary-parent
    /// links, joined with `" > "`. The root's own label is excluded, so
    /// the root's path is empty and its children's paths are their own
    /// labels.
    pub path: String,
    pub depth: u32,
}

/// Project the graph into one row per node, in creation order.
pub fn topic_rows(graph: &Graph) -> Vec<TopicRow> {
    let root_topic = graph
        .nodes()
        .iter()
        .find(|n| n.is_root())
        .map(|n| n.topic.clone());
    graph
        .nodes()
        .iter()
        .map(|node| {
            let mut chain = graph.hierarchy(&node.id);
            if chain.first() == root_topic.as_ref() {
                chain.remove(0);
            }
            TopicRow {
                id: node.id.clone(),
                topic: node.topic.clone(),
                path: chain.join(" > "),
                depth: node.depth,
            }
        })
        .collect()
}

/// Write the projection as CSV with an `id,topic,path,depth` header.
pub fn write_csv(graph: &Graph, path: &Path) -> Result<usize> {
    let rows = topic_rows(graph);
    let mut writer = csv::Writer::from_path(path).map_err(io_error)?;
    for row in &rows {
        writer.serialize(row).map_err(io_error)?;
    }
    writer.flush()?;
    Ok(rows.len())
}

fn io_error(e: csv::Error) -> crate::error::OntographError {
    crate::error::OntographError::Export(e.to_string())
}
