//! Agent-to-agent discovery and routing over council-core's A2A data model
//! (§3: [`council_core::a2a::AgentCapabilityDescriptor`]/[`A2aMessage`]): a
//! capability registry, a priority-ranked router, and a pending-message
//! queue for agents without a registered handler yet.

use std::collections::HashMap;
use std::sync::Mutex;

pub use council_core::a2a::{A2aMessage, AgentCapabilityDescriptor, Capability};

/// An agent's handler: receives a message addressed to it, optionally
/// returns a response. A handler that panics is not caught — callers are
/// expected to keep handlers infallible; a wrapping try/catch around each
/// handler invocation would only amount to logging anyway.
pub type MessageHandler = Box<dyn Fn(&A2aMessage) -> Option<A2aMessage> + Send + Sync>;

struct LoggedMessage {
    id: String,
    from_agent: String,
    to_agent: String,
    action: String,
    timestamp: u64,
}

/// Registry + router + pending-message queue bridging internal agents to
/// external MCP-speaking peers.
#[derive(Default)]
pub struct A2ABridge {
    agents: Mutex<HashMap<String, AgentCapabilityDescriptor>>,
    handlers: Mutex<HashMap<String, MessageHandler>>,
    pending: Mutex<Vec<A2aMessage>>,
    message_log: Mutex<Vec<LoggedMessage>>,
}

impl A2ABridge {
    /// An empty bridge with no agents or handlers registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) an agent's capability descriptor.
    pub fn register_agent(&self, descriptor: AgentCapabilityDescriptor) {
        tracing::info!(agent = %descriptor.agent_name, capabilities = ?descriptor.capabilities, "registered agent");
        self.agents.lock().expect("agents lock poisoned").insert(descriptor.agent_name.clone(), descriptor);
    }

    /// Register (or replace) the handler invoked when a message is
    /// addressed to `agent_name`.
    pub fn register_handler(&self, agent_name: impl Into<String>, handler: MessageHandler) {
        self.handlers.lock().expect("handlers lock poisoned").insert(agent_name.into(), handler);
    }

    /// All registered agents, optionally filtered to those advertising
    /// `capability`.
    pub fn discover_agents(&self, capability: Option<&str>) -> Vec<AgentCapabilityDescriptor> {
        let agents = self.agents.lock().expect("agents lock poisoned");
        match capability {
            None => agents.values().cloned().collect(),
            Some(cap) => agents.values().filter(|d| d.capabilities.contains(cap)).cloned().collect(),
        }
    }

    /// Route `message` to the highest-priority agent advertising
    /// `capability`, rewriting `message.to_agent` before sending. Returns
    /// `None` if no agent advertises the capability.
    pub fn route_to_best_agent(&self, capability: &str, mut message: A2aMessage) -> Option<A2aMessage> {
        let mut candidates = self.discover_agents(Some(capability));
        if candidates.is_empty() {
            tracing::warn!(capability, "no agents found with requested capability");
            return None;
        }
        candidates.sort_by(|a, b| b.priority.cmp(&a.priority));
        message.to_agent = candidates[0].agent_name.clone();
        self.send_message(message)
    }

    /// Send a message: invoke the destination's handler immediately if
    /// one is registered, otherwise queue it for [`Self::process_pending`].
    pub fn send_message(&self, message: A2aMessage) -> Option<A2aMessage> {
        self.log_message(&message);
        tracing::info!(from = %message.from_agent, to = %message.to_agent, action = %message.action, "a2a message");

        let handler_exists = self.handlers.lock().expect("handlers lock poisoned").contains_key(&message.to_agent);
        if !handler_exists {
            tracing::debug!(to = %message.to_agent, "message queued, no handler registered");
            self.pending.lock().expect("pending lock poisoned").push(message);
            return None;
        }

        let response = {
            let handlers = self.handlers.lock().expect("handlers lock poisoned");
            let handler = handlers.get(&message.to_agent)?;
            handler(&message)
        };
        if let Some(resp) = &response {
            self.log_message(resp);
        }
        response
    }

    /// Re-attempt delivery of every queued message whose destination now
    /// has a handler. Returns how many were successfully processed.
    pub fn process_pending(&self) -> usize {
        let mut pending = self.pending.lock().expect("pending lock poisoned");
        let handlers = self.handlers.lock().expect("handlers lock poisoned");

        let mut processed = 0;
        let mut remaining = Vec::new();
        for message in pending.drain(..) {
            match handlers.get(&message.to_agent) {
                Some(handler) => {
                    handler(&message);
                    processed += 1;
                }
                None => remaining.push(message),
            }
        }
        *pending = remaining;
        processed
    }

    /// Number of messages still awaiting a handler.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().expect("pending lock poisoned").len()
    }

    fn log_message(&self, message: &A2aMessage) {
        self.message_log.lock().expect("log lock poisoned").push(LoggedMessage {
            id: message.message_id.clone(),
            from_agent: message.from_agent.clone(),
            to_agent: message.to_agent.clone(),
            action: message.action.clone(),
            timestamp: message.timestamp,
        });
    }

    /// The most recent `limit` logged messages, oldest first.
    pub fn message_log(&self, limit: usize) -> Vec<serde_json::Value> {
        let log = self.message_log.lock().expect("log lock poisoned");
        let start = log.len().saturating_sub(limit);
        log[start..]
            .iter()
            .map(|m| serde_json::json!({"id": m.id, "from": m.from_agent, "to": m.to_agent, "action": m.action, "timestamp": m.timestamp}))
            .collect()
    }
}

fn descriptor(name: &str, capabilities: &[&str], priority: u8) -> AgentCapabilityDescriptor {
    AgentCapabilityDescriptor {
        agent_name: name.to_string(),
        capabilities: capabilities.iter().map(|c| c.to_string()).collect(),
        description: String::new(),
        input_schema: serde_json::Value::Null,
        output_schema: serde_json::Value::Null,
        version: "1.0.0".to_string(),
        priority,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(from: &str, to: &str, action: &str) -> A2aMessage {
        A2aMessage {
            message_id: format!("{from}-{to}-{action}"),
            from_agent: from.to_string(),
            to_agent: to.to_string(),
            action: action.to_string(),
            payload: serde_json::Value::Null,
            timestamp: 0,
            reply_to: None,
            correlation_id: None,
        }
    }

    #[test]
    fn discover_agents_filters_by_capability() {
        let bridge = A2ABridge::new();
        bridge.register_agent(descriptor("pm", &["think", "vote"], 0));
        bridge.register_agent(descriptor("coder", &["code"], 0));

        assert_eq!(bridge.discover_agents(None).len(), 2);
        assert_eq!(bridge.discover_agents(Some("code")).len(), 1);
        assert_eq!(bridge.discover_agents(Some("security_audit")).len(), 0);
    }

    #[test]
    fn route_to_best_agent_picks_highest_priority() {
        let bridge = A2ABridge::new();
        bridge.register_agent(descriptor("low", &["review"], 1));
        bridge.register_agent(descriptor("high", &["review"], 10));

        bridge.register_handler(
            "high",
            Box::new(|m| Some(A2aMessage { to_agent: m.from_agent.clone(), from_agent: m.to_agent.clone(), ..m.clone() })),
        );

        let response = bridge.route_to_best_agent("review", msg("orchestrator", "unset", "review"));
        assert!(response.is_some());
        assert_eq!(response.unwrap().from_agent, "high");
    }

    #[test]
    fn unhandled_messages_queue_then_drain_on_process_pending() {
        let bridge = A2ABridge::new();
        bridge.send_message(msg("a", "b", "ping"));
        assert_eq!(bridge.pending_count(), 1);

        bridge.register_handler("b", Box::new(|_| None));
        let processed = bridge.process_pending();
        assert_eq!(processed, 1);
        assert_eq!(bridge.pending_count(), 0);
    }

    #[test]
    fn message_log_records_both_request_and_response() {
        let bridge = A2ABridge::new();
        bridge.register_handler("b", Box::new(|m| Some(msg(&m.to_agent, &m.from_agent, "pong"))));
        bridge.send_message(msg("a", "b", "ping"));
        assert_eq!(bridge.message_log(10).len(), 2);
    }
}
