//! Tagged error kinds for every component boundary.
//!
//! Every fallible council operation returns one of these `#[non_exhaustive]`
//! enums rather than a bare string, so a caller can match on the kind instead
//! of parsing a message. See `SPEC_FULL.md` §7 for the authoritative table.

use thiserror::Error;

/// Errors raised by an [`crate::agent::Agent`] while running `think`/`vote`/`execute`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AgentError {
    /// The underlying model call failed.
    #[error("model error: {0}")]
    Model(String),
    /// A tool invocation failed.
    #[error("tool '{tool}' failed: {message}")]
    Tool {
        /// Name of the failing tool.
        tool: String,
        /// Human-readable failure detail.
        message: String,
    },
    /// Context assembly (memory query, rolling-context read) failed.
    #[error("context assembly failed: {0}")]
    ContextAssembly(String),
    /// A bounded-retry condition was exhausted.
    #[error("retryable error exhausted: {0}")]
    Retryable(String),
    /// A non-retryable error.
    #[error("non-retryable error: {0}")]
    NonRetryable(String),
    /// Catch-all for anything else.
    #[error("{0}")]
    Other(String),
}

/// Errors raised by the hook pipeline.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HookError {
    /// A hook handler itself failed.
    #[error("hook '{hook}' failed: {message}")]
    Failed {
        /// Name of the failing hook.
        hook: String,
        /// Failure detail.
        message: String,
    },
    /// Catch-all.
    #[error("{0}")]
    Other(String),
}

/// Errors raised by [`crate::state::StateStore`] implementations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StateError {
    /// No value at the given scope/key.
    #[error("not found: scope={scope:?} key={key}")]
    NotFound {
        /// The scope that was queried.
        scope: String,
        /// The key that was queried.
        key: String,
    },
    /// Write failed (disk full, permission denied, …).
    #[error("write failed: {0}")]
    WriteFailed(String),
    /// (De)serialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
    /// Catch-all.
    #[error("{0}")]
    Other(String),
}

/// Errors raised by sandbox providers (§4.1).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SandboxError {
    /// The sandboxed process exceeded its wall-clock timeout.
    #[error("sandbox timeout after {millis}ms")]
    Timeout {
        /// Configured timeout, in milliseconds.
        millis: u64,
    },
    /// The requested sandbox provider is unavailable.
    #[error("sandbox provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Spawning or communicating with the child process failed.
    #[error("sandbox io error: {0}")]
    Io(String),
}

/// Errors raised by the PTC executor (§4.3).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PtcError {
    /// Static validation rejected the script (invariant 1).
    #[error("security violation: {0}")]
    SecurityViolation(String),
    /// The pre-tool-use hook returned `block`.
    #[error("hook blocked execution: {hook}: {reason}")]
    HookBlocked {
        /// Name of the blocking hook.
        hook: String,
        /// Reason supplied by the hook.
        reason: String,
    },
    /// Sandbox execution itself failed.
    #[error("sandbox error: {0}")]
    Sandbox(#[from] SandboxError),
    /// Tool execution inside the script failed.
    #[error("tool execution failed: {0}")]
    ToolExecution(String),
}

/// Errors raised by the governance gateway (§4.7).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GovernanceError {
    /// The action/decision requires approval and none has been granted yet.
    #[error("approval required for request {request_id}")]
    ApprovalRequired {
        /// The pending request id.
        request_id: String,
    },
    /// The action/decision was explicitly denied.
    #[error("approval denied for request {request_id}: {reason}")]
    ApprovalDenied {
        /// The denied request id.
        request_id: String,
        /// Reason given by the approver.
        reason: String,
    },
    /// The tool is not in the allowlist, or its call/path budget is exhausted.
    #[error("tool '{tool}' not permitted: {reason}")]
    ToolNotPermitted {
        /// Name of the disallowed tool.
        tool: String,
        /// Why it was refused.
        reason: String,
    },
    /// Catch-all.
    #[error("{0}")]
    Other(String),
}

/// Errors raised by the self-healing loop (§4.11).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HealingError {
    /// The generated patch's confidence was below the acceptance threshold.
    #[error("patch confidence {confidence} below threshold")]
    PatchLowConfidence {
        /// The rejected patch's confidence score.
        confidence: f64,
    },
    /// The loop exhausted `max_iterations` without converging.
    #[error("max iterations ({0}) reached without success")]
    MaxIterations(u32),
    /// Running the test command itself failed (not a test failure — a process error).
    #[error("test command error: {0}")]
    TestCommand(String),
}

/// Errors raised by the knowledge graph (§4.5).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MemoryError {
    /// A relation referenced an entity id that isn't in the graph.
    #[error("unknown entity: {0}")]
    UnknownEntity(String),
    /// The persistence file extension wasn't `.json` or `.gml`.
    #[error("unsupported graph format: {0}")]
    UnsupportedFormat(String),
    /// Reading or writing the persistence file failed.
    #[error("graph io error: {0}")]
    Io(String),
    /// (De)serialization failed.
    #[error("graph serialization error: {0}")]
    Serialization(String),
}

/// Errors raised by model providers (§4.12).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProviderError {
    /// The provider call timed out.
    #[error("provider timed out after {millis}ms")]
    Timeout {
        /// Configured timeout, in milliseconds.
        millis: u64,
    },
    /// The provider returned an error.
    #[error("provider error: {0}")]
    Upstream(String),
    /// Catch-all.
    #[error("{0}")]
    Other(String),
}

/// Errors raised by the MCP JSON-RPC router (§4.15), mapped to the standard codes.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum McpError {
    /// `-32700`: the request body was not valid JSON.
    #[error("parse error: {0}")]
    Parse(String),
    /// `-32600`: the request was not a valid JSON-RPC 2.0 envelope.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// `-32601`: no handler registered for the method.
    #[error("method not found: {0}")]
    MethodNotFound(String),
    /// `-32602`: the params did not match the method's schema.
    #[error("invalid params: {0}")]
    InvalidParams(String),
    /// `-32603`: the handler itself failed.
    #[error("internal error: {0}")]
    Internal(String),
}

impl McpError {
    /// The standard JSON-RPC 2.0 error code for this error kind.
    pub fn code(&self) -> i64 {
        match self {
            McpError::Parse(_) => -32700,
            McpError::InvalidRequest(_) => -32600,
            McpError::MethodNotFound(_) => -32601,
            McpError::InvalidParams(_) => -32602,
            McpError::Internal(_) => -32603,
        }
    }
}

/// Top-level error composing the errors that can surface from orchestration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum OrchError {
    /// No agent is registered under the given name.
    #[error("agent not found: {0}")]
    AgentNotFound(String),
    /// No workflow is running/checkpointed under the given id.
    #[error("workflow not found: {0}")]
    WorkflowNotFound(String),
    /// Dispatch to an agent failed.
    #[error("dispatch failed: {0}")]
    DispatchFailed(String),
    /// An agent-level error propagated up.
    #[error(transparent)]
    Agent(#[from] AgentError),
    /// A governance-level error propagated up.
    #[error(transparent)]
    Governance(#[from] GovernanceError),
    /// Catch-all.
    #[error("{0}")]
    Other(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mcp_error_codes_match_json_rpc_spec() {
        assert_eq!(McpError::Parse("x".into()).code(), -32700);
        assert_eq!(McpError::InvalidRequest("x".into()).code(), -32600);
        assert_eq!(McpError::MethodNotFound("x".into()).code(), -32601);
        assert_eq!(McpError::InvalidParams("x".into()).code(), -32602);
        assert_eq!(McpError::Internal("x".into()).code(), -32603);
    }
}
