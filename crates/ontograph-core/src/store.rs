use crate::error::Result;
use crate::graph::Graph;
use log::warn;
use std::fs;
use std::path::{Path, PathBuf};

/// Durable whole-snapshot storage for a graph.
///
/// One JSON artifact, rewritten in full after every processed node. Saves
/// go through a sibling temp file followed by an atomic rename, so a crash
/// mid-write never corrupts the primary artifact. Last write wins: at most
/// one engine run may operate against a given artifact at a time.
#[derive(Debug, Clone)]
pub struct GraphStore {
    path: PathBuf,
}

impl GraphStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        GraphStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted graph. A missing, zero-length, or unparseable
    /// artifact yields an empty graph: the run continues and rebuilds from
    /// the root rather than refusing to start. Corruption is logged but
    /// never surfaced.
    pub fn load(&self) -> Graph {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(_) => return Graph::new(),
        };
        if bytes.is_empty() {
            return Graph::new();
        }
        match serde_json::from_slice(&bytes) {
            Ok(graph) => graph,
            Err(e) => {
                warn!(
                    "discarding unreadable graph artifact {}: {}",
                    self.path.display(),
                    e
                );
                Graph::new()
            }
        }
    }

    /// Atomically persist the graph. Write failures propagate: losing
    /// already-computed graph state is the one fatal condition in the
    /// system.
    pub fn save(&self, graph: &Graph) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                fs::create_dir_all(dir)?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(graph)?;
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
