//! The Agent protocol — what one agent does per invocation.
//!
//! This is the atomic execution boundary: receive input, assemble context,
//! reason (model call), act (tool execution), produce output + effects.
//! The richer `think`/`vote`/`execute` capability surface of the Agent
//! Kernel (§4.13) is built on top of this trait in `council-agent`; this
//! module defines the shape every agent implementation — single-shot,
//! ReAct loop, or human-in-the-loop — must expose.

use crate::{content::Content, duration::DurationMs, effect::Effect, error::AgentError, id::*};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// What triggered an agent invocation. Informs context assembly — a
/// scheduled trigger means reconstructing everything from state, while a
/// user message carries conversation context naturally.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    /// Human sent a message.
    User,
    /// Another agent assigned a task (§3 Task).
    Task,
    /// Signal from another workflow/agent.
    Signal,
    /// Cron/schedule triggered.
    Schedule,
    /// System event (file change, webhook, etc.).
    SystemEvent,
    /// Future trigger types.
    Custom(String),
}

/// Input to an agent invocation.
///
/// Design decision: `AgentInput` does NOT include conversation history or memory contents.
/// The agent runtime reads those from a `StateReader`/`MemoryAggregator`
/// during context assembly. `AgentInput` carries only the information that
/// is new to this invocation.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentInput {
    /// The new message/task/signal that triggered this invocation.
    pub message: Content,

    /// What caused this invocation to start.
    pub trigger: TriggerType,

    /// Session for conversation continuity. `None` means stateless.
    pub session: Option<SessionId>,

    /// Per-invocation configuration overrides. `None` means "use defaults."
    pub config: Option<AgentConfig>,

    /// Opaque metadata that passes through unchanged (tracing, routing, …).
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Per-invocation configuration overrides. Every field is optional — `None`
/// means "use the implementation's default."
#[non_exhaustive]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum iterations of the inner ReAct loop.
    pub max_turns: Option<u32>,
    /// Maximum cost for this invocation in USD.
    pub max_cost: Option<Decimal>,
    /// Maximum wall-clock time for this invocation.
    pub max_duration: Option<DurationMs>,
    /// Model override (implementation-specific string).
    pub model: Option<String>,
    /// Tool restrictions. `None` = use defaults; `Some(list)` = only these.
    pub allowed_tools: Option<Vec<String>>,
    /// Additional system prompt content; augments, does not replace, identity.
    pub system_addendum: Option<String>,
}

/// Why an agent invocation ended.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    /// Model produced a final text response (natural completion).
    Complete,
    /// Hit the `max_turns` limit.
    MaxTurns,
    /// Hit the cost budget.
    BudgetExhausted,
    /// Circuit breaker tripped (consecutive failures).
    CircuitBreaker,
    /// Wall-clock timeout.
    Timeout,
    /// A hook returned `block` (§4.6).
    ObserverHalt {
        /// The reason supplied by the blocking hook.
        reason: String,
    },
    /// Unrecoverable error during execution.
    Error,
    /// Future exit reasons.
    Custom(String),
}

/// Output from an agent invocation.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentOutput {
    /// The agent's response content.
    pub message: Content,
    /// Why the invocation ended.
    pub exit_reason: ExitReason,
    /// Execution metadata (cost, tokens, timing).
    pub metadata: AgentMetadata,
    /// Side-effects the agent wants executed.
    ///
    /// The agent declares effects but does not execute them — the calling
    /// layer (orchestrator, workflow runner) decides when and how. This is
    /// what keeps the agent runtime independent of what surrounds it.
    #[serde(default)]
    pub effects: Vec<Effect>,
}

/// Execution metadata. Concrete, not optional — every agent produces this.
/// Implementations that can't track a field (e.g. cost for a local model)
/// use zero/default.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentMetadata {
    /// Input tokens consumed.
    pub tokens_in: u64,
    /// Output tokens generated.
    pub tokens_out: u64,
    /// Cost in USD.
    pub cost: Decimal,
    /// Number of ReAct loop iterations used.
    pub turns_used: u32,
    /// Record of each tool call made.
    pub tools_called: Vec<ToolCallRecord>,
    /// Wall-clock duration of the invocation.
    pub duration: DurationMs,
}

/// Record of a single tool invocation within an agent's execution.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRecord {
    /// Name of the tool that was called.
    pub name: String,
    /// How long the tool call took.
    pub duration: DurationMs,
    /// Whether the call succeeded.
    pub success: bool,
}

impl Default for AgentMetadata {
    fn default() -> Self {
        Self {
            tokens_in: 0,
            tokens_out: 0,
            cost: Decimal::ZERO,
            turns_used: 0,
            tools_called: vec![],
            duration: DurationMs::ZERO,
        }
    }
}

impl AgentInput {
    /// Create a new `AgentInput` with required fields.
    pub fn new(message: Content, trigger: TriggerType) -> Self {
        Self {
            message,
            trigger,
            session: None,
            config: None,
            metadata: serde_json::Value::Null,
        }
    }
}

impl AgentOutput {
    /// Create a new `AgentOutput` with required fields.
    pub fn new(message: Content, exit_reason: ExitReason) -> Self {
        Self {
            message,
            exit_reason,
            metadata: AgentMetadata::default(),
            effects: vec![],
        }
    }
}

impl ToolCallRecord {
    /// Create a new `ToolCallRecord`.
    pub fn new(name: impl Into<String>, duration: DurationMs, success: bool) -> Self {
        Self {
            name: name.into(),
            duration,
            success,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// THE TRAIT
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Protocol ① — The Agent
///
/// What one agent does per invocation. Receives input, assembles context,
/// reasons (model call), acts (tool execution), produces output + effects.
///
/// Implementations:
/// - The council Agent Kernel (§4.13, `council-agent`): full ReAct loop
///   with tools, memory, and PTC batching.
/// - A raw API call wrapper (minimal, no tools).
/// - A mock (for testing).
///
/// The trait is intentionally one method — the agent is atomic from the
/// outside. Everything that happens inside (how many model calls, how
/// many tool uses) is the implementation's concern.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Execute a single agent invocation.
    ///
    /// The agent MAY read from a `StateReader`/memory fabric during context
    /// assembly. The agent MUST NOT write to external state directly — it
    /// declares writes as `Effect`s in the output.
    async fn execute(&self, input: AgentInput) -> Result<AgentOutput, AgentError>;
}
