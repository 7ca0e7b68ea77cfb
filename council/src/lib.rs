#![deny(missing_docs)]
//! # council — facade crate
//!
//! Single import surface for the council runtime. Re-exports every
//! `council-*` crate behind a feature flag, plus [`CouncilOrchestrator`]:
//! the §4.14 pipeline tying task decomposition, capability-routed
//! dispatch, vote aggregation, and decision recording together.
//!
//! `council-agent`, `council-mcp`, `council-memory`, `council-router`, and
//! `council-tool` are mandatory dependencies — `CouncilOrchestrator` is
//! built directly on them. Everything else (healing, workflow, sandbox,
//! governance, blast-radius, hooks, the reducer/PTC pair, and the two
//! state backends) is optional, gated behind features instead of pulled
//! in unconditionally.

pub use council_agent;
pub use council_core;
pub use council_mcp;
pub use council_memory;
pub use council_router;
pub use council_tool;

#[cfg(feature = "blast-radius")]
pub use council_blast_radius;
#[cfg(feature = "executor")]
pub use council_executor;
#[cfg(feature = "governance")]
pub use council_governance;
#[cfg(feature = "healing")]
pub use council_healing;
#[cfg(feature = "hook-builtins")]
pub use council_hook_builtins;
#[cfg(feature = "hooks")]
pub use council_hooks;
#[cfg(feature = "ptc")]
pub use council_ptc;
#[cfg(feature = "reducer")]
pub use council_reducer;
#[cfg(feature = "sandbox")]
pub use council_sandbox;
#[cfg(feature = "state-fs")]
pub use council_state_fs;
#[cfg(feature = "state-memory")]
pub use council_state_memory;
#[cfg(feature = "workflow")]
pub use council_workflow;

mod orchestrator;
pub use orchestrator::CouncilOrchestrator;

/// Happy-path imports for composing a council.
pub mod prelude {
    pub use council_agent::{ExecuteResult, Kernel, LLMSession, ThinkResult, Vote, VoteDecision};
    pub use council_core::{Agent, AgentInput, AgentOutput, Task, TaskStatus};
    pub use council_mcp::{A2ABridge, MCPProtocolHandler};
    pub use council_memory::{KnowledgeGraph, MemoryAggregator};
    pub use council_router::{AdaptiveRouter, ResponseMode, RoutingDecision};

    pub use crate::CouncilOrchestrator;
}
