//! The Hook interface — observation and intervention in an agent's inner loop
//! and in tool/session lifecycle events (§3, §4.6).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::HookError;

/// Where in the agent lifecycle a hook fires.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookType {
    /// Session/workflow start — restore state, load env, run init script.
    SessionStart,
    /// Before a tool (or PTC batch) executes.
    PreToolUse,
    /// After a tool completes, before its result enters context.
    PostToolUse,
    /// Before each model inference call.
    PreInference,
    /// After the model responds, before tool execution.
    PostInference,
    /// At each exit-condition check.
    ExitCheck,
    /// Future hook points.
    Custom(String),
}

/// What context is available to a hook at its firing point (§3).
///
/// Read-only — hooks observe and decide, they don't mutate directly.
/// (Mutation happens via `HookResult::modified_data`.)
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookContext {
    /// Which hook point this is.
    pub hook_type: HookType,
    /// The session this hook fires within.
    pub session_id: String,
    /// The agent this hook fires on behalf of.
    pub agent_name: String,
    /// Current tool being called (only at Pre/PostToolUse).
    pub tool_name: Option<String>,
    /// Tool arguments (only at PreToolUse).
    pub tool_args: Option<serde_json::Value>,
    /// Tool result (only at PostToolUse).
    pub tool_result: Option<String>,
    /// Working directory of the session.
    pub working_dir: String,
    /// Environment variables visible to the session.
    #[serde(default)]
    pub env_vars: std::collections::HashMap<String, String>,
    /// Opaque metadata passed through unchanged, and mergeable by a
    /// `modify` result from an earlier hook in the chain.
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl HookContext {
    /// Create a new context with only the required fields set.
    pub fn new(
        hook_type: HookType,
        session_id: impl Into<String>,
        agent_name: impl Into<String>,
        working_dir: impl Into<String>,
    ) -> Self {
        Self {
            hook_type,
            session_id: session_id.into(),
            agent_name: agent_name.into(),
            tool_name: None,
            tool_args: None,
            tool_result: None,
            working_dir: working_dir.into(),
            env_vars: std::collections::HashMap::new(),
            metadata: serde_json::Value::Null,
        }
    }

    /// Merge a `modify` result's `modified_data` into this context's metadata,
    /// per §4.6 step 4 ("merge into context").
    pub fn merge_modified(&mut self, modified_data: &serde_json::Value) {
        if let (Some(base), Some(incoming)) = (self.metadata.as_object_mut(), modified_data.as_object()) {
            for (k, v) in incoming {
                base.insert(k.clone(), v.clone());
            }
        } else {
            self.metadata = modified_data.clone();
        }
    }
}

/// What a hook decided, and why (§3).
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookAction {
    /// Continue normally.
    Allow,
    /// Halt the chain / reject the action.
    Block,
    /// Continue, but with `modified_data` merged into the context.
    Modify,
    /// Ask the caller to retry (e.g. PostToolUse gate failure under the retry budget).
    Retry,
}

/// The outcome of invoking a single hook (§3).
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookResult {
    /// The decision.
    pub action: HookAction,
    /// Human-readable explanation.
    pub message: String,
    /// Structured metadata about the decision (e.g. which pattern matched).
    #[serde(default)]
    pub metadata: serde_json::Value,
    /// Present when `action == Modify`: merged into the context for
    /// subsequent hooks in the chain.
    pub modified_data: Option<serde_json::Value>,
    /// Present when the hook itself failed (as opposed to deciding `block`).
    pub error: Option<String>,
    /// Unix timestamp, milliseconds, of when the hook ran.
    pub timestamp: u64,
}

impl HookResult {
    /// Build an `allow` result.
    pub fn allow(message: impl Into<String>, timestamp: u64) -> Self {
        Self {
            action: HookAction::Allow,
            message: message.into(),
            metadata: serde_json::Value::Null,
            modified_data: None,
            error: None,
            timestamp,
        }
    }

    /// Build a `block` result.
    pub fn block(message: impl Into<String>, timestamp: u64) -> Self {
        Self {
            action: HookAction::Block,
            message: message.into(),
            metadata: serde_json::Value::Null,
            modified_data: None,
            error: None,
            timestamp,
        }
    }
}

/// A hook that can observe and intervene at the registered `HookType` points (§4.6).
///
/// Hooks are registered with a `HookManager` and fire in ascending
/// `priority` order within each `HookType`. A hook handler SHOULD complete
/// quickly — an LLM-backed guardrail on every tool call adds latency to
/// every tool call; that cost is the hook author's responsibility.
#[async_trait]
pub trait Hook: Send + Sync {
    /// Which points this hook fires at.
    fn points(&self) -> &[HookType];

    /// Ordering within a hook type. Lower runs first.
    fn priority(&self) -> u32;

    /// Called at each registered hook point.
    ///
    /// Per §4.6 step 2: a hook that returns `Err` does not abort the
    /// chain — the caller records an allow result carrying the error and
    /// continues. Use `HookResult` with `action: Block` to actually halt.
    async fn on_event(&self, ctx: &HookContext) -> Result<HookResult, HookError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_modified_combines_object_keys() {
        let mut ctx = HookContext::new(HookType::PreToolUse, "s1", "architect", "/work");
        ctx.metadata = serde_json::json!({"a": 1});
        ctx.merge_modified(&serde_json::json!({"b": 2}));
        assert_eq!(ctx.metadata, serde_json::json!({"a": 1, "b": 2}));
    }
}
