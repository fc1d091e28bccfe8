pub mod types;
pub mod error;
pub mod graph;
pub mod store;
pub mod merge;
pub mod engine;
pub mod events;
pub mod expander;
pub mod export;

pub use error::{OntographError, Result};
pub use types::*;
pub use graph::Graph;
pub use store::GraphStore;
pub use merge::{MergeResolver, Resolution};
pub use engine::{
    EngineConfig, ExpansionEngine, Pacing, RunSummary, StopReason, DEFAULT_GATE_THRESHOLD,
};
pub use events::{BroadcastChannel, GraphEvent, LiveChannel, NullChannel};
pub use expander::{sanitize, Suggestion, TopicExpander};
pub use export::{topic_rows, write_csv, TopicRow};
