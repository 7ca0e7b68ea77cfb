//! # council-core — protocol traits and data model for the council runtime
//!
//! This crate defines the protocol boundaries and shared data types that
//! every other `council-*` crate builds on: the agent execution boundary,
//! the orchestrator that composes agents, the state protocol data lives
//! behind, the hook interface that observes and intervenes, and the
//! request/task/workflow/approval/memory data model shared across
//! components. See `SPEC_FULL.md` for the authoritative component design.
//!
//! ## The Protocols
//!
//! | Protocol | Trait | What it does |
//! |----------|-------|---------------|
//! | ① Agent | [`agent::Agent`] | What one agent does per invocation |
//! | ② Orchestration | [`orchestrator::Orchestrator`] | How agents compose |
//! | ③ State | [`state::StateStore`] | How data persists across invocations |
//!
//! ## The Interfaces
//!
//! | Interface | Types | What it does |
//! |-----------|-------|---------------|
//! | Hooks | [`hook::Hook`], [`hook::HookType`], [`hook::HookAction`] | Observation + intervention |
//! | Lifecycle | [`lifecycle::BudgetEvent`], [`lifecycle::CompactionEvent`] | Cross-layer coordination |
//!
//! ## Design Principle
//!
//! Every protocol trait is operation-defined, not mechanism-defined.
//! [`agent::Agent::execute`] means "cause this agent to process one
//! invocation" — not "make an API call." This is what lets `council-agent`,
//! `council-executor`, and `council-mcp` share one boundary while differing
//! completely in what happens behind it.
//!
//! ## Dependency Notes
//!
//! This crate depends on `serde_json::Value` for extension fields
//! (metadata, tool arguments, custom payloads). JSON is the interchange
//! format the rest of the workspace assumes; a generic `T: Serialize`
//! parameter would complicate trait object safety for no practical benefit.

#![deny(missing_docs)]

pub mod a2a;
pub mod agent;
pub mod approval;
pub mod checkpoint;
pub mod content;
pub mod duration;
pub mod effect;
pub mod error;
pub mod healing;
pub mod hook;
pub mod id;
pub mod lifecycle;
pub mod memory_types;
pub mod orchestrator;
pub mod state;
pub mod task;
pub mod tool_meta;
pub mod workflow;

#[cfg(feature = "test-utils")]
pub mod test_utils;

// Re-exports for convenience.
pub use a2a::{A2aMessage, AgentCapabilityDescriptor, Capability};
pub use agent::{Agent, AgentConfig, AgentInput, AgentOutput, ExitReason, ToolCallRecord, TriggerType};
pub use approval::{ApprovalKind, ApprovalRequest, RiskLevel, ToolPermission};
pub use checkpoint::Checkpoint;
pub use content::{Content, ContentBlock};
pub use duration::DurationMs;
pub use effect::{Effect, LogLevel, Scope, SignalPayload};
pub use error::{
    AgentError, GovernanceError, HealingError, HookError, McpError, MemoryError, OrchError,
    PtcError, ProviderError, SandboxError, StateError,
};
pub use healing::{Diagnosis, ErrorType, HealingOutcome, HealingReport, Patch, TestCounts, TestResult};
pub use hook::{Hook, HookAction, HookContext, HookResult, HookType};
pub use id::{AgentId, CheckpointId, EntityId, RequestId, ScopeId, SessionId, TaskId, WorkflowId};
pub use lifecycle::{BudgetEvent, CompactionEvent, ObservableEvent};
pub use memory_types::{
    CacheEntry, Entity, EntityType, MemoryEntry, Relation, RelationType, RollingContext, RoundEntry,
    Tier,
};
pub use orchestrator::{Orchestrator, QueryPayload};
pub use state::{SearchResult, StateReader, StateStore};
pub use task::{Task, TaskStatus};
pub use tool_meta::ToolDefinition;
pub use workflow::{Phase, WorkflowState};
