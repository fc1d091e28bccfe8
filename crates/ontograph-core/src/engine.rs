use crate::error::Result;
use crate::events::{GraphEvent, LiveChannel};
use crate::expander::{sanitize, TopicExpander};
use crate::graph::Graph;
use crate::merge::{MergeResolver, Resolution};
use crate::store::GraphStore;
use crate::types::{NodeState, DEFAULT_ROOT_TOPIC};
use log::{debug, error, info};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

/// Importance cutoff below which a node is skipped without expansion.
pub const DEFAULT_GATE_THRESHOLD: u8 = 6;

/// Deliberate delays between event emissions. These keep the visual stream
/// watchable and give the hosting transport room to flush; they are not a
/// backpressure mechanism. Zero them in tests and headless runs.
#[derive(Debug, Clone, Copy)]
pub struct Pacing {
    /// After announcing a node entering processing.
    pub update: Duration,
    /// Between `new_node` emissions.
    pub node: Duration,
    /// Between `new_edge` emissions.
    pub edge: Duration,
}

impl Pacing {
    pub const ZERO: Pacing = Pacing {
        update: Duration::ZERO,
        node: Duration::ZERO,
        edge: Duration::ZERO,
    };
}

impl Default for Pacing {
    fn default() -> Self {
        Pacing {
            update: Duration::from_millis(100),
            node: Duration::from_millis(50),
            edge: Duration::from_millis(20),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Hard ceiling on total node count, the root included.
    pub max_nodes: usize,
    /// Nodes with importance below this are skipped unexpanded.
    pub gate_threshold: u8,
    /// Topic label given to a freshly bootstrapped root.
    pub root_topic: String,
    pub pacing: Pacing,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            max_nodes: 25_000,
            gate_threshold: DEFAULT_GATE_THRESHOLD,
            root_topic: DEFAULT_ROOT_TOPIC.to_string(),
            pacing: Pacing::default(),
        }
    }
}

/// Why a run stopped. Both are ordinary exits, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The node cap was reached.
    CapReached,
    /// No Pending node remains.
    Exhausted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub nodes_processed: usize,
    pub nodes_created: usize,
    pub edges_created: usize,
    pub stop: StopReason,
}

/// The main control loop.
///
/// Single-threaded and synchronous: one node is selected, one capability
/// call is awaited, one batch of merges is applied, one atomic persist
/// occurs, before the next node is considered. The engine owns the graph
/// mutably for the whole run (single-writer); observers only receive
/// events through the injected sink.
pub struct ExpansionEngine<E: TopicExpander> {
    store: GraphStore,
    expander: E,
    sink: Arc<dyn LiveChannel>,
    resolver: MergeResolver,
    config: EngineConfig,
}

impl<E: TopicExpander> ExpansionEngine<E> {
    pub fn new(store: GraphStore, expander: E, sink: Arc<dyn LiveChannel>, config: EngineConfig) -> Self {
        ExpansionEngine {
            store,
            expander,
            sink,
            resolver: MergeResolver::new(),
            config,
        }
    }

    /// Process Pending nodes until the cap is reached or none remain.
    ///
    /// Per processed node the engine emits `update_node`, then (for an
    /// expansion) `new_node` and `new_edge` deltas in creation order, then
    /// exactly one `batch_ready` — also on the skip and failure paths,
    /// with an empty child list. The graph is persisted after every
    /// processed node and once more on exit; a persist failure is the one
    /// fatal error.
    pub async fn run(&self, graph: &mut Graph) -> Result<RunSummary> {
        if graph.is_empty() && self.config.max_nodes > 0 {
            graph.ensure_root(&self.config.root_topic);
            info!("bootstrapped root topic '{}'", self.config.root_topic);
        }

        self.sink.emit(GraphEvent::ExistingNodes(graph.nodes().to_vec()));
        if graph.edge_count() > 0 {
            self.sink.emit(GraphEvent::ExistingEdges(graph.edges().to_vec()));
        }

        let mut summary = RunSummary {
            nodes_processed: 0,
            nodes_created: 0,
            edges_created: 0,
            stop: StopReason::Exhausted,
        };

        summary.stop = loop {
            if graph.node_count() >= self.config.max_nodes {
                break StopReason::CapReached;
            }
            let Some(node) = graph.next_pending() else {
                break StopReason::Exhausted;
            };
            summary.nodes_processed += 1;

            self.sink.emit(GraphEvent::UpdateNode(node.clone()));
            sleep(self.config.pacing.update).await;

            if node.importance < self.config.gate_threshold {
                debug!(
                    "gating '{}' (importance {} < {})",
                    node.topic, node.importance, self.config.gate_threshold
                );
                self.skip_and_close_batch(graph, &node.id)?;
                continue;
            }

            let hierarchy = graph.hierarchy(&node.id);
            let suggestions = match self.expander.expand(&node.topic, &hierarchy).await {
                Ok(raw) => sanitize(raw),
                Err(e) => {
                    // No retry: the node is finalized for this run and the
                    // loop moves on.
                    error!("failed to expand '{}': {}", node.topic, e);
                    self.skip_and_close_batch(graph, &node.id)?;
                    continue;
                }
            };

            if suggestions.is_empty() {
                self.skip_and_close_batch(graph, &node.id)?;
                continue;
            }

            let mut new_nodes = Vec::new();
            let mut new_edges = Vec::new();
            let mut cap_hit = false;
            for (order, suggestion) in suggestions.iter().enumerate() {
                match self.resolver.resolve(
                    graph,
                    &node,
                    suggestion,
                    order as u32,
                    self.config.max_nodes,
                ) {
                    Resolution::CreatedNew { node_id } => {
                        new_edges.push((node.id.clone(), node_id.clone()));
                        new_nodes.push(
                            graph.node(&node_id).expect("just created").clone(),
                        );
                    }
                    Resolution::LinkedExisting { child_id, edge_added } => {
                        if edge_added {
                            new_edges.push((node.id.clone(), child_id));
                        }
                    }
                    Resolution::CapExhausted => {
                        cap_hit = true;
                        break;
                    }
                }
            }

            // Expanded regardless of how many suggestions deduped away.
            graph.set_state(&node.id, NodeState::Expanded)?;
            summary.nodes_created += new_nodes.len();
            summary.edges_created += new_edges.len();
            self.store.save(graph)?;

            for created in &new_nodes {
                self.sink.emit(GraphEvent::NewNode(created.clone()));
                sleep(self.config.pacing.node).await;
            }
            for (from, to) in &new_edges {
                self.sink.emit(GraphEvent::NewEdge {
                    from: from.clone(),
                    to: to.clone(),
                });
                sleep(self.config.pacing.edge).await;
            }
            self.sink.emit(GraphEvent::BatchReady {
                parent_id: node.id.clone(),
                children: new_nodes.iter().map(|n| n.id.clone()).collect(),
            });

            if cap_hit {
                break StopReason::CapReached;
            }
        };

        self.store.save(graph)?;
        info!(
            "run finished: {} processed, {} created, {} nodes total ({:?})",
            summary.nodes_processed,
            summary.nodes_created,
            graph.node_count(),
            summary.stop
        );
        Ok(summary)
    }

    /// Shared tail of the gated-skip, empty-skip, and failure paths: the
    /// node is finalized Skipped, persisted, and its batch closed with no
    /// children.
    fn skip_and_close_batch(&self, graph: &mut Graph, node_id: &str) -> Result<()> {
        graph.set_state(node_id, NodeState::Skipped)?;
        self.store.save(graph)?;
        self.sink.emit(GraphEvent::BatchReady {
            parent_id: node_id.to_string(),
            children: Vec::new(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OntographError;
    use crate::events::NullChannel;
    use crate::expander::Suggestion;
    use crate::types::{Node, NodeState, ROOT_ID};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tempfile::{tempdir, TempDir};

    /// Scripted capability double: responses keyed by topic, every call
    /// recorded. Unscripted topics answer with an empty list.
    #[derive(Default)]
    struct ScriptedExpander {
        scripts: HashMap<String, std::result::Result<Vec<Suggestion>, String>>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedExpander {
        fn returns(mut self, topic: &str, suggestions: Vec<Suggestion>) -> Self {
            self.scripts.insert(topic.to_string(), Ok(suggestions));
            self
        }

        fn fails(mut self, topic: &str) -> Self {
            self.scripts
                .insert(topic.to_string(), Err("boom".to_string()));
            self
        }

        fn calls_for(&self, topic: &str) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|t| t.as_str() == topic)
                .count()
        }
    }

    #[async_trait]
    impl TopicExpander for ScriptedExpander {
        async fn expand(&self, topic: &str, _hierarchy: &[String]) -> Result<Vec<Suggestion>> {
            self.calls.lock().unwrap().push(topic.to_string());
            match self.scripts.get(topic) {
                Some(Ok(suggestions)) => Ok(suggestions.clone()),
                Some(Err(msg)) => Err(OntographError::Expander(msg.clone())),
                None => Ok(Vec::new()),
            }
        }
    }

    /// Sink that records every event for order assertions.
    #[derive(Default)]
    struct CollectingChannel {
        events: Mutex<Vec<GraphEvent>>,
    }

    impl CollectingChannel {
        fn names(&self) -> Vec<&'static str> {
            self.events.lock().unwrap().iter().map(|e| e.name()).collect()
        }

        fn events(&self) -> Vec<GraphEvent> {
            self.events.lock().unwrap().clone()
        }
    }

    impl LiveChannel for CollectingChannel {
        fn emit(&self, event: GraphEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    fn test_config(max_nodes: usize) -> EngineConfig {
        EngineConfig {
            max_nodes,
            pacing: Pacing::ZERO,
            ..EngineConfig::default()
        }
    }

    fn test_store() -> (GraphStore, TempDir) {
        let dir = tempdir().unwrap();
        (GraphStore::new(dir.path().join("graph.json")), dir)
    }

    async fn run_engine(
        expander: Arc<ScriptedExpander>,
        graph: &mut Graph,
        max_nodes: usize,
    ) -> (RunSummary, Arc<CollectingChannel>, GraphStore, TempDir) {
        let (store, dir) = test_store();
        let sink = Arc::new(CollectingChannel::default());
        let engine = ExpansionEngine::new(
            store.clone(),
            expander,
            sink.clone(),
            test_config(max_nodes),
        );
        let summary = engine.run(graph).await.unwrap();
        (summary, sink, store, dir)
    }

    #[tokio::test]
    async fn test_fresh_store_cap_one_leaves_root_pending() {
        let expander = Arc::new(ScriptedExpander::default()
            .returns(DEFAULT_ROOT_TOPIC, vec![Suggestion::new("Physics", 8)]));
        let mut graph = Graph::new();

        let (summary, _, store, _dir) = run_engine(expander.clone(), &mut graph, 1).await;

        // The root's creation already meets the cap; it is never processed.
        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.node(ROOT_ID).unwrap().state, NodeState::Pending);
        assert_eq!(expander.calls_for(DEFAULT_ROOT_TOPIC), 0);
        assert_eq!(summary.stop, StopReason::CapReached);
        assert_eq!(summary.nodes_processed, 0);
        assert_eq!(store.load().node_count(), 1);
    }

    #[tokio::test]
    async fn test_cap_zero_creates_nothing() {
        let expander = Arc::new(ScriptedExpander::default());
        let mut graph = Graph::new();

        let (summary, _, store, _dir) = run_engine(expander.clone(), &mut graph, 0).await;

        assert!(graph.is_empty());
        assert_eq!(summary.stop, StopReason::CapReached);
        assert!(store.load().is_empty());
    }

    #[tokio::test]
    async fn test_gate_skips_without_capability_call() {
        let expander = Arc::new(ScriptedExpander::default());
        let mut graph = Graph::new();
        let mut root = Node::root(DEFAULT_ROOT_TOPIC);
        root.state = NodeState::Expanded;
        graph.insert_node(root).unwrap();
        let dim = Node::child("Folklore", ROOT_ID.into(), 0, 5);
        let dim_id = dim.id.clone();
        graph.insert_node(dim).unwrap();

        let (summary, sink, _, _dir) = run_engine(expander.clone(), &mut graph, 10).await;

        assert_eq!(graph.node(&dim_id).unwrap().state, NodeState::Skipped);
        assert_eq!(expander.calls_for("Folklore"), 0);
        assert_eq!(summary.nodes_processed, 1);
        // Gated nodes still close their batch; no edges yet, so no
        // existing_edges snapshot either.
        assert_eq!(
            sink.names(),
            vec!["existing_nodes", "update_node", "batch_ready"]
        );
    }

    #[tokio::test]
    async fn test_empty_response_skips_node() {
        let expander = Arc::new(ScriptedExpander::default().returns(DEFAULT_ROOT_TOPIC, vec![]));
        let mut graph = Graph::new();

        let (summary, _, _, _dir) = run_engine(expander.clone(), &mut graph, 10).await;

        assert_eq!(graph.node(ROOT_ID).unwrap().state, NodeState::Skipped);
        assert_eq!(expander.calls_for(DEFAULT_ROOT_TOPIC), 1);
        assert_eq!(summary.nodes_created, 0);
        assert_eq!(summary.stop, StopReason::Exhausted);
    }

    #[tokio::test]
    async fn test_in_batch_dedup_creates_one_node_one_edge() {
        let expander = Arc::new(ScriptedExpander::default().returns(
            DEFAULT_ROOT_TOPIC,
            vec![Suggestion::new("Physics", 8), Suggestion::new("physics", 8)],
        ));
        let mut graph = Graph::new();

        let (summary, sink, _, _dir) = run_engine(expander.clone(), &mut graph, 100).await;

        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.node(ROOT_ID).unwrap().state, NodeState::Expanded);
        assert_eq!(summary.nodes_created, 1);

        // Physics itself was then processed (unscripted → empty → skip).
        let physics_id = graph.node_id_by_topic("physics").unwrap().clone();
        assert_eq!(graph.node(&physics_id).unwrap().state, NodeState::Skipped);

        let batch_children: Vec<_> = sink
            .events()
            .iter()
            .filter_map(|e| match e {
                GraphEvent::BatchReady { parent_id, children } if parent_id == ROOT_ID => {
                    Some(children.clone())
                }
                _ => None,
            })
            .collect();
        assert_eq!(batch_children, vec![vec![physics_id]]);
    }

    #[tokio::test]
    async fn test_batch_event_order() {
        let expander = Arc::new(ScriptedExpander::default().returns(
            DEFAULT_ROOT_TOPIC,
            vec![Suggestion::new("Physics", 2), Suggestion::new("Chemistry", 3)],
        ));
        let mut graph = Graph::new();

        let (_, sink, _, _dir) = run_engine(expander.clone(), &mut graph, 100).await;

        // Root batch: deltas strictly before batch_ready, nodes before
        // edges. The two low-importance children then gate out.
        assert_eq!(
            sink.names(),
            vec![
                "existing_nodes",
                "update_node",
                "new_node",
                "new_node",
                "new_edge",
                "new_edge",
                "batch_ready",
                "update_node",
                "batch_ready",
                "update_node",
                "batch_ready",
            ]
        );
    }

    #[tokio::test]
    async fn test_capability_failure_skips_and_continues() {
        let expander = Arc::new(ScriptedExpander::default()
            .fails("Physics")
            .returns("Chemistry", vec![]));
        let mut graph = Graph::new();
        let mut root = Node::root(DEFAULT_ROOT_TOPIC);
        root.state = NodeState::Expanded;
        graph.insert_node(root).unwrap();
        let physics = Node::child("Physics", ROOT_ID.into(), 0, 7);
        let physics_id = physics.id.clone();
        graph.insert_node(physics).unwrap();
        let chemistry = Node::child("Chemistry", ROOT_ID.into(), 0, 7);
        let chemistry_id = chemistry.id.clone();
        graph.insert_node(chemistry).unwrap();

        let (summary, _, _, _dir) = run_engine(expander.clone(), &mut graph, 10).await;

        // Failure finalizes Physics as Skipped with no children and the
        // run proceeds to Chemistry rather than aborting.
        assert_eq!(graph.node(&physics_id).unwrap().state, NodeState::Skipped);
        assert_eq!(graph.node(&chemistry_id).unwrap().state, NodeState::Skipped);
        assert_eq!(graph.node_count(), 3);
        assert_eq!(expander.calls_for("Chemistry"), 1);
        assert_eq!(summary.nodes_processed, 2);
        assert_eq!(summary.stop, StopReason::Exhausted);
    }

    #[tokio::test]
    async fn test_cap_mid_batch_accepts_one_and_terminates() {
        let expander = Arc::new(ScriptedExpander::default().returns(
            "Physics",
            vec![
                Suggestion::new("Mechanics", 8),
                Suggestion::new("Optics", 8),
                Suggestion::new("Acoustics", 8),
                Suggestion::new("Thermodynamics", 8),
                Suggestion::new("Electromagnetism", 8),
            ],
        ));
        let mut graph = Graph::new();
        let mut root = Node::root(DEFAULT_ROOT_TOPIC);
        root.state = NodeState::Expanded;
        graph.insert_node(root).unwrap();
        let physics = Node::child("Physics", ROOT_ID.into(), 0, 8);
        let physics_id = physics.id.clone();
        graph.insert_node(physics).unwrap();

        let (summary, sink, store, _dir) = run_engine(expander.clone(), &mut graph, 3).await;

        // Exactly one of the five suggestions fit under the cap.
        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.node(&physics_id).unwrap().state, NodeState::Expanded);
        assert_eq!(summary.nodes_created, 1);
        assert_eq!(summary.stop, StopReason::CapReached);
        assert_eq!(store.load().node_count(), 3);

        let mechanics_id = graph.node_id_by_topic("Mechanics").unwrap().clone();
        let batches: Vec<_> = sink
            .events()
            .iter()
            .filter_map(|e| match e {
                GraphEvent::BatchReady { children, .. } => Some(children.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(batches, vec![vec![mechanics_id]]);
    }

    #[tokio::test]
    async fn test_rerun_on_settled_graph_adds_nothing() {
        let expander = Arc::new(ScriptedExpander::default()
            .returns(DEFAULT_ROOT_TOPIC, vec![Suggestion::new("Physics", 8)]));
        let mut graph = Graph::new();

        run_engine(expander.clone(), &mut graph, 100).await;
        let (nodes, edges) = (graph.node_count(), graph.edge_count());
        assert_eq!(graph.pending_count(), 0);

        let (summary, sink, _, _dir) = run_engine(expander.clone(), &mut graph, 100).await;

        assert_eq!(graph.node_count(), nodes);
        assert_eq!(graph.edge_count(), edges);
        assert_eq!(summary.nodes_processed, 0);
        assert_eq!(summary.stop, StopReason::Exhausted);
        assert_eq!(sink.names(), vec!["existing_nodes", "existing_edges"]);
    }

    #[tokio::test]
    async fn test_resume_from_persisted_snapshot() {
        let expander = Arc::new(ScriptedExpander::default()
            .returns(DEFAULT_ROOT_TOPIC, vec![Suggestion::new("Physics", 8)])
            .returns("Physics", vec![Suggestion::new("Mechanics", 7)]));

        let (store, _dir) = test_store();
        let config = test_config(2);
        let engine = ExpansionEngine::new(
            store.clone(),
            expander.clone(),
            Arc::new(NullChannel),
            config,
        );
        let mut graph = store.load();
        engine.run(&mut graph).await.unwrap();
        // Cap 2: Physics was created but never processed.
        assert_eq!(graph.pending_count(), 1);

        // A later run against the same artifact picks Physics up.
        let engine = ExpansionEngine::new(
            store.clone(),
            expander.clone(),
            Arc::new(NullChannel),
            test_config(10),
        );
        let mut resumed = store.load();
        let summary = engine.run(&mut resumed).await.unwrap();

        assert_eq!(expander.calls_for("Physics"), 1);
        assert!(summary.nodes_processed >= 1);
        let physics_id = resumed.node_id_by_topic("Physics").unwrap().clone();
        assert_eq!(resumed.node(&physics_id).unwrap().state, NodeState::Expanded);
        assert!(resumed.node_id_by_topic("Mechanics").is_some());
    }

    #[tokio::test]
    async fn test_depth_invariant_over_multi_level_run() {
        let expander = Arc::new(ScriptedExpander::default()
            .returns(DEFAULT_ROOT_TOPIC, vec![Suggestion::new("Physics", 8)])
            .returns("Physics", vec![Suggestion::new("Mechanics", 8)])
            .returns("Mechanics", vec![]));
        let mut graph = Graph::new();

        run_engine(expander.clone(), &mut graph, 100).await;

        for node in graph.nodes() {
            match &node.primary_parent_id {
                None => assert_eq!(node.depth, 0),
                Some(pid) => {
                    assert_eq!(node.depth, graph.node(pid).unwrap().depth + 1)
                }
            }
        }
        let mechanics_id = graph.node_id_by_topic("Mechanics").unwrap();
        assert_eq!(
            graph.hierarchy(mechanics_id),
            vec!["Knowledge", "Physics", "Mechanics"]
        );
    }

    #[tokio::test]
    async fn test_cap_respected_across_sizes() {
        for cap in [0usize, 1, 10, 10_000] {
            let expander = Arc::new(ScriptedExpander::default().returns(
                DEFAULT_ROOT_TOPIC,
                vec![
                    Suggestion::new("Physics", 8),
                    Suggestion::new("Chemistry", 8),
                    Suggestion::new("Biology", 8),
                ],
            ));
            let mut graph = Graph::new();
            run_engine(expander.clone(), &mut graph, cap).await;
            assert!(graph.node_count() <= cap, "cap {cap} violated");
        }
    }
}
