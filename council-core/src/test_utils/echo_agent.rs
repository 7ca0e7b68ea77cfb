//! EchoAgent — returns the input message as the output.

use crate::agent::{Agent, AgentInput, AgentMetadata, AgentOutput, ExitReason};
use crate::error::AgentError;
use async_trait::async_trait;

/// An agent implementation that echoes the input message back as output.
/// Used for testing orchestration and hook integrations.
pub struct EchoAgent;

#[async_trait]
impl Agent for EchoAgent {
    async fn execute(&self, input: AgentInput) -> Result<AgentOutput, AgentError> {
        Ok(AgentOutput {
            message: input.message,
            exit_reason: ExitReason::Complete,
            metadata: AgentMetadata::default(),
            effects: vec![],
        })
    }
}
