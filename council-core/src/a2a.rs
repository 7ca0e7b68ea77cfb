//! Agent-to-agent messaging data model (§3).

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// A single capability an agent advertises, e.g. `"code_review"`.
pub type Capability = String;

/// A point-to-point message exchanged between agents, outside the
/// orchestrator's own dispatch/effect machinery — used for direct
/// agent-to-agent coordination (A2A).
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct A2aMessage {
    /// Unique identifier.
    pub message_id: String,
    /// Sending agent.
    pub from_agent: String,
    /// Receiving agent.
    pub to_agent: String,
    /// What the sender wants done, e.g. `"review"`, `"delegate"`.
    pub action: String,
    /// Arbitrary payload.
    pub payload: serde_json::Value,
    /// Unix timestamp, milliseconds, of send.
    pub timestamp: u64,
    /// If this message is a reply, the `message_id` it replies to.
    pub reply_to: Option<String>,
    /// Correlates a request with its eventual reply across a longer exchange.
    pub correlation_id: Option<String>,
}

/// Advertised capabilities and schema of an agent, for A2A discovery.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentCapabilityDescriptor {
    /// Name of the agent.
    pub agent_name: String,
    /// Capabilities this agent claims to support.
    pub capabilities: HashSet<Capability>,
    /// Human-readable summary of what the agent does.
    pub description: String,
    /// JSON Schema describing accepted input.
    pub input_schema: serde_json::Value,
    /// JSON Schema describing produced output.
    pub output_schema: serde_json::Value,
    /// Descriptor schema version.
    pub version: String,
    /// Routing priority when multiple agents advertise the same capability.
    pub priority: u8,
}
