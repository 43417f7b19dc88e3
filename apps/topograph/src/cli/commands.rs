//! # CLI Command Implementations

use crate::agent::Agent;
use crate::config::AgentConfig;
use crate::runner::SystemRunner;
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use topograph_core::primitives::MAX_SNAPSHOT_BLOB_SIZE;
use topograph_core::{Graph, TopologyError, decode_snapshot, reclassify_value};

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum size of a hardware description to reclassify (100 MB).
const MAX_HARDWARE_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Validate file size before reading.
fn validate_file_size(path: &Path, max_size: u64) -> Result<(), TopologyError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| TopologyError::Io(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size {
        return Err(TopologyError::Io(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

// =============================================================================
// GRAPH SUMMARY
// =============================================================================

/// Node and edge counts of a graph, nodes broken down by `Type`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphSummary {
    pub nodes: usize,
    pub edges: usize,
    pub by_type: BTreeMap<String, usize>,
}

impl GraphSummary {
    #[must_use]
    pub fn of(graph: &Graph) -> Self {
        let mut by_type = BTreeMap::new();
        for node in graph.nodes() {
            let kind = node.get_str("Type").unwrap_or("untyped").to_string();
            *by_type.entry(kind).or_insert(0) += 1;
        }
        Self {
            nodes: graph.node_count(),
            edges: graph.edge_count(),
            by_type,
        }
    }

    fn print(&self, json_mode: bool) {
        if json_mode {
            let output = serde_json::json!({
                "node_count": self.nodes,
                "edge_count": self.edges,
                "nodes_by_type": self.by_type,
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&output).unwrap_or_default()
            );
            return;
        }

        println!("Topology Summary");
        println!("================");
        println!("Nodes: {}", self.nodes);
        println!("Edges: {}", self.edges);
        println!();
        for (kind, count) in &self.by_type {
            println!("  {:<10} {}", kind, count);
        }
    }
}

// =============================================================================
// AGENT COMMAND
// =============================================================================

/// Run the agent until Ctrl-C, then print what was rendered.
pub async fn cmd_agent(config: Option<&Path>, json_mode: bool) -> Result<(), TopologyError> {
    let config = AgentConfig::load(config)?;
    let graph = Arc::new(Graph::new());
    let runner = Arc::new(SystemRunner::new(config.command_timeout()));

    tracing::info!(
        "Starting agent for {} (collecting every {}s)",
        config.host_id,
        config.tick_interval().as_secs()
    );
    let agent = Agent::start(&config, graph.clone(), runner).await?;

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| TopologyError::Io(format!("Cannot listen for Ctrl-C: {}", e)))?;
    tracing::info!("Interrupted, shutting down");

    agent.stop().await;
    GraphSummary::of(&graph).print(json_mode);
    Ok(())
}

// =============================================================================
// RECLASSIFY COMMAND
// =============================================================================

/// Re-key a hardware document and return it.
pub fn reclassify_file(path: &Path) -> Result<Value, TopologyError> {
    validate_file_size(path, MAX_HARDWARE_FILE_SIZE)?;
    let raw = std::fs::read(path)
        .map_err(|e| TopologyError::Io(format!("Cannot read '{}': {}", path.display(), e)))?;
    let mut tree: Value = serde_json::from_slice(&raw)
        .map_err(|e| TopologyError::Decode(format!("Invalid JSON: {}", e)))?;
    reclassify_value(&mut tree);
    Ok(tree)
}

pub fn cmd_reclassify(path: &Path) -> Result<(), TopologyError> {
    let tree = reclassify_file(path)?;
    let output =
        serde_json::to_string_pretty(&tree).map_err(|e| TopologyError::Encode(e.to_string()))?;
    println!("{}", output);
    Ok(())
}

// =============================================================================
// INSPECT COMMAND
// =============================================================================

/// Decode a blob into readable JSON.
pub fn inspect_blob(blob: &str) -> Result<Value, TopologyError> {
    let snapshot = decode_snapshot(blob.trim())?;
    serde_json::to_value(&snapshot).map_err(|e| TopologyError::Encode(e.to_string()))
}

pub fn cmd_inspect(blob: &str) -> Result<(), TopologyError> {
    let blob = if blob == "-" {
        let mut input = String::new();
        std::io::stdin()
            .take(MAX_SNAPSHOT_BLOB_SIZE as u64 + 1)
            .read_to_string(&mut input)
            .map_err(|e| TopologyError::Io(format!("Cannot read stdin: {}", e)))?;
        input
    } else {
        blob.to_string()
    };

    let value = inspect_blob(&blob)?;
    let output =
        serde_json::to_string_pretty(&value).map_err(|e| TopologyError::Encode(e.to_string()))?;
    println!("{}", output);
    Ok(())
}
