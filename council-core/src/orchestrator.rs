//! The Orchestrator protocol — how agents from a council compose.

use crate::{agent::AgentInput, agent::AgentOutput, error::OrchError, id::*};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Protocol ② — Orchestration
///
/// How agents compose, and how a council's execution survives failures.
/// Implementations:
/// - A local, in-process orchestrator (tokio tasks, no durability) —
///   what `council-executor` provides for §4.14's Council Orchestrator.
/// - A workflow-engine-backed orchestrator for durable, checkpointed runs.
///
/// The key property: calling code doesn't know which implementation is
/// behind the trait. `dispatch()` might be a function call or a hop to a
/// durable workflow engine. The trait is transport-agnostic.
#[async_trait]
pub trait Orchestrator: Send + Sync {
    /// Dispatch a single invocation to an agent.
    async fn dispatch(&self, agent: &AgentId, input: AgentInput) -> Result<AgentOutput, OrchError>;

    /// Dispatch multiple invocations in parallel.
    ///
    /// Returns results in the same order as the input tasks. Individual
    /// tasks may fail independently.
    async fn dispatch_many(&self, tasks: Vec<(AgentId, AgentInput)>) -> Vec<Result<AgentOutput, OrchError>>;

    /// Fire-and-forget signal to a running workflow.
    ///
    /// Returns `Ok(())` when the signal is accepted (not when processed —
    /// that's inherently async).
    async fn signal(&self, target: &WorkflowId, signal: crate::effect::SignalPayload) -> Result<(), OrchError>;

    /// Read-only query of a running workflow's state.
    async fn query(&self, target: &WorkflowId, query: QueryPayload) -> Result<serde_json::Value, OrchError>;
}

/// Payload for querying a running workflow.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryPayload {
    /// The type of query to execute.
    pub query_type: String,
    /// Query parameters.
    pub params: serde_json::Value,
}

impl QueryPayload {
    /// Create a new query payload.
    pub fn new(query_type: impl Into<String>, params: serde_json::Value) -> Self {
        Self {
            query_type: query_type.into(),
            params,
        }
    }
}
