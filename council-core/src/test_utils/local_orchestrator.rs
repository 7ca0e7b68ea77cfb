//! LocalOrchestrator — in-process orchestrator with a map of agents.

use crate::agent::{Agent, AgentInput, AgentOutput};
use crate::effect::SignalPayload;
use crate::error::OrchError;
use crate::id::{AgentId, WorkflowId};
use crate::orchestrator::{Orchestrator, QueryPayload};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// In-process orchestrator that dispatches invocations to registered agents.
/// Uses `Arc<dyn Agent>` so `dispatch_many` can fan out via `tokio::spawn`.
pub struct LocalOrchestrator {
    agents: HashMap<String, Arc<dyn Agent>>,
}

impl LocalOrchestrator {
    /// Create a new, empty orchestrator.
    pub fn new() -> Self {
        Self {
            agents: HashMap::new(),
        }
    }

    /// Register an agent under an id.
    pub fn register(&mut self, id: AgentId, agent: Arc<dyn Agent>) {
        self.agents.insert(id.0, agent);
    }
}

impl Default for LocalOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Orchestrator for LocalOrchestrator {
    async fn dispatch(&self, agent: &AgentId, input: AgentInput) -> Result<AgentOutput, OrchError> {
        let agent_impl = self
            .agents
            .get(agent.as_str())
            .ok_or_else(|| OrchError::AgentNotFound(agent.to_string()))?;
        agent_impl.execute(input).await.map_err(OrchError::Agent)
    }

    async fn dispatch_many(&self, tasks: Vec<(AgentId, AgentInput)>) -> Vec<Result<AgentOutput, OrchError>> {
        let mut handles = Vec::with_capacity(tasks.len());

        for (agent_id, input) in tasks {
            match self.agents.get(agent_id.as_str()) {
                Some(agent_impl) => {
                    let agent_impl = Arc::clone(agent_impl);
                    handles.push(tokio::spawn(async move {
                        agent_impl.execute(input).await.map_err(OrchError::Agent)
                    }));
                }
                None => {
                    let name = agent_id.to_string();
                    handles.push(tokio::spawn(async move { Err(OrchError::AgentNotFound(name)) }));
                }
            }
        }

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok(result) => results.push(result),
                Err(e) => results.push(Err(OrchError::DispatchFailed(e.to_string()))),
            }
        }

        results
    }

    async fn signal(&self, _target: &WorkflowId, _signal: SignalPayload) -> Result<(), OrchError> {
        Ok(())
    }

    async fn query(&self, _target: &WorkflowId, _query: QueryPayload) -> Result<serde_json::Value, OrchError> {
        Ok(serde_json::Value::Null)
    }
}
