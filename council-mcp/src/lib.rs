#![deny(missing_docs)]
//! MCP JSON-RPC surface and A2A bridge (C15, §4.14/§4.15).
//!
//! Two independent pieces, mirroring the split between a client/server
//! pair and its own stdio transport:
//!
//! - [`MCPProtocolHandler`] is a transport-free JSON-RPC 2.0 router:
//!   `tools/list`, `tools/call`, `resources/list`, plus the two built-in
//!   tools `council_query` and `simulate_plan`. It never touches stdin,
//!   a socket, or `rmcp` — wiring a transport on top is the caller's job,
//!   same as an `McpServer` wires `rmcp`'s stdio transport on top of a
//!   `ToolRegistry`.
//! - [`A2ABridge`] is the agent-to-agent discovery/routing layer: a
//!   capability registry, `discover_agents`/`route_to_best_agent`, and a
//!   pending-message queue drained by `process_pending`.
//!
//! `simulate_plan` does not carry over `check_syntax` from its Python
//! grounding — that step shells out to `compile()`, a dynamic-language
//! concept with no Rust equivalent. Delete-conflict detection against the
//! knowledge graph is the part worth keeping, and that part is ported in
//! full.

mod a2a;
mod protocol;
mod simulate;

pub use a2a::{A2ABridge, A2aMessage, AgentCapabilityDescriptor, Capability};
pub use protocol::{council_query_tool_def, simulate_plan_tool_def, MCPProtocolHandler, ToolDef, ToolHandler};
pub use simulate::simulate_plan;

pub use council_core::error::McpError;
