use clap::{Args, Parser, Subcommand};
use ontograph_core::{EngineConfig, Pacing};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "ontograph")]
#[command(about = "Live topic ontology graph builder")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Host the graph over HTTP/WebSocket while the engine expands it
    Serve(ServeArgs),
    /// Run the engine headless until the cap is reached or no Pending node remains
    Build(BuildArgs),
    /// Write the flat topics CSV projection of the persisted graph
    Export(ExportArgs),
}

/// Options shared by every engine-driving command.
#[derive(Args, Debug, Clone)]
pub struct GraphArgs {
    /// Path of the persisted graph artifact
    #[arg(long, env = "ONTOGRAPH_GRAPH", default_value = "./data/graph.json")]
    pub graph: PathBuf,

    /// Hard ceiling on total node count, the root included
    #[arg(long, env = "ONTOGRAPH_MAX_NODES", default_value = "25000")]
    pub max_nodes: usize,

    /// Topic label for a freshly bootstrapped root
    #[arg(long, env = "ONTOGRAPH_ROOT_TOPIC", default_value = "Knowledge")]
    pub root_topic: String,

    /// Importance cutoff below which nodes are skipped unexpanded
    #[arg(long, env = "ONTOGRAPH_GATE_THRESHOLD", default_value = "6")]
    pub gate_threshold: u8,
}

/// Capability-adapter options, OpenAI-compatible chat completions.
#[derive(Args, Debug, Clone)]
pub struct ExpanderArgs {
    /// API key for the suggestion capability
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Base URL of the OpenAI-compatible endpoint
    #[arg(long, env = "OPENAI_BASE_URL", default_value = "https://api.openai.com/v1")]
    pub base_url: String,

    /// Comma-separated model pool; one is picked at random per call
    #[arg(
        long,
        env = "MODEL_LIST",
        value_delimiter = ',',
        default_value = "anthropic/claude-sonnet-4,openai/gpt-5,qwen/qwen3-max"
    )]
    pub models: Vec<String>,

    /// Per-request timeout in seconds
    #[arg(long, env = "ONTOGRAPH_EXPAND_TIMEOUT", default_value = "60")]
    pub timeout_secs: u64,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// HTTP listen address
    #[arg(long, env = "ONTOGRAPH_HTTP_ADDR", default_value = "0.0.0.0:5000")]
    pub http_addr: SocketAddr,

    #[command(flatten)]
    pub graph: GraphArgs,

    #[command(flatten)]
    pub expander: ExpanderArgs,
}

#[derive(Args, Debug)]
pub struct BuildArgs {
    #[command(flatten)]
    pub graph: GraphArgs,

    #[command(flatten)]
    pub expander: ExpanderArgs,
}

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Path of the persisted graph artifact
    #[arg(long, env = "ONTOGRAPH_GRAPH", default_value = "./data/graph.json")]
    pub graph: PathBuf,

    /// Output CSV path
    #[arg(long, default_value = "./data/topics.csv")]
    pub out: PathBuf,
}

impl GraphArgs {
    /// Engine config for a watched run: default pacing keeps the stream
    /// readable.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            max_nodes: self.max_nodes,
            gate_threshold: self.gate_threshold,
            root_topic: self.root_topic.clone(),
            pacing: Pacing::default(),
        }
    }

    /// Engine config for a headless run: nobody is watching, skip the
    /// pacing delays.
    pub fn engine_config_headless(&self) -> EngineConfig {
        EngineConfig {
            pacing: Pacing::ZERO,
            ..self.engine_config()
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if let Some(dir) = self.graph.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                std::fs::create_dir_all(dir)?;
            }
        }
        Ok(())
    }
}
