//! Checkpoint data model (§3): durable snapshots of a `council-workflow` run.

use serde::{Deserialize, Serialize};

use crate::id::CheckpointId;

/// A persisted snapshot of a workflow-graph walk, consumable once by `resume`.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Unique identifier.
    pub id: CheckpointId,
    /// Name of the workflow graph this checkpoint belongs to.
    pub graph_name: String,
    /// The node the walk was at when the checkpoint was taken.
    pub current_node: String,
    /// Serialized workflow state at checkpoint time.
    pub state_data: serde_json::Value,
    /// Unix timestamp, milliseconds, of creation.
    pub timestamp: u64,
    /// Free-form metadata (e.g. who triggered it, why).
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl Checkpoint {
    /// Create a new checkpoint.
    pub fn new(
        id: CheckpointId,
        graph_name: impl Into<String>,
        current_node: impl Into<String>,
        state_data: serde_json::Value,
        timestamp: u64,
    ) -> Self {
        Self {
            id,
            graph_name: graph_name.into(),
            current_node: current_node.into(),
            state_data,
            timestamp,
            metadata: serde_json::Value::Null,
        }
    }
}
