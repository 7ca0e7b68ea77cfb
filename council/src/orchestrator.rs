//! [`CouncilOrchestrator`]: task decomposition, capability-based dispatch,
//! vote aggregation, and decision recording (§4.14).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use council_agent::{Vote, VoteDecision};
use council_core::a2a::A2aMessage;
use council_core::id::{EntityId, TaskId};
use council_core::memory_types::{EntityType, RelationType};
use council_core::task::Task;
use council_mcp::A2ABridge;
use council_memory::KnowledgeGraph;
use council_router::{AdaptiveRouter, RoutingDecision};
use serde_json::json;

/// Decomposes a goal into dependency-respecting subtasks, routes and
/// dispatches them via capability discovery, aggregates the votes cast on
/// a proposal, and records the outcome in a knowledge graph.
///
/// Task decomposition itself is not an algorithm this type runs — that is
/// an agent's `think`/`execute` job (§4.13), same as the source's own
/// `PLANNER` role is a model call, not a deterministic decomposition
/// function. [`CouncilOrchestrator::decompose`] turns an already-decided
/// subtask list into tracked [`Task`]s; the decision of *what* the
/// subtasks are belongs upstream.
pub struct CouncilOrchestrator {
    router: Mutex<AdaptiveRouter>,
    bridge: A2ABridge,
    knowledge_graph: Mutex<KnowledgeGraph>,
    next_task_seq: AtomicU64,
}

impl CouncilOrchestrator {
    /// Build an orchestrator rooted at `project_root` (used by the
    /// router's blast-radius analysis) with a fresh knowledge graph.
    pub fn new(project_root: impl Into<std::path::PathBuf>) -> Self {
        Self {
            router: Mutex::new(AdaptiveRouter::new(project_root)),
            bridge: A2ABridge::new(),
            knowledge_graph: Mutex::new(KnowledgeGraph::new()),
            next_task_seq: AtomicU64::new(1),
        }
    }

    /// The agent discovery/routing bridge, for registering agents and
    /// their handlers before dispatching.
    pub fn bridge(&self) -> &A2ABridge {
        &self.bridge
    }

    /// Turn a flat list of subtask descriptions into sequentially
    /// dependent [`Task`]s: each depends on the one before it. Priority
    /// is uniform; callers that need a different shape (parallel
    /// subtasks, partial ordering) should build `Task`s directly instead.
    pub fn decompose(&self, subtasks: &[impl AsRef<str>], priority: u8, now_ms: u64) -> Vec<Task> {
        let mut tasks = Vec::with_capacity(subtasks.len());
        let mut previous: Option<TaskId> = None;

        for description in subtasks {
            let seq = self.next_task_seq.fetch_add(1, Ordering::Relaxed);
            let id = TaskId::new(format!("task-{seq}"));
            let mut task = Task::new(id.clone(), description.as_ref(), priority, now_ms);
            if let Some(dep) = previous.take() {
                task.dependencies.push(dep);
            }
            previous = Some(id);
            tasks.push(task);
        }

        tasks
    }

    /// Assess risk and pick a response mode (single-model / swarm-verify
    /// / full-council) for a piece of work.
    pub fn route(&self, task: &str, context: Option<&str>) -> RoutingDecision {
        self.router.lock().expect("router lock poisoned").route(task, context)
    }

    /// Dispatch a message to the highest-priority agent advertising
    /// `capability`.
    pub fn dispatch(&self, capability: &str, message: A2aMessage) -> Option<A2aMessage> {
        self.bridge.route_to_best_agent(capability, message)
    }

    /// Aggregate a proposal's votes into one [`VoteDecision`]: each
    /// decision's confidences are summed, the highest-sum decision wins,
    /// and a tie is broken by [`VoteDecision::rank`] — so a 0.5/0.5 tie
    /// between `hold` and `approve` resolves to `approve`. Returns `None`
    /// for an empty vote set.
    pub fn aggregate_votes(votes: &[Vote]) -> Option<VoteDecision> {
        if votes.is_empty() {
            return None;
        }

        const VARIANTS: [VoteDecision; 4] =
            [VoteDecision::ApproveWithChanges, VoteDecision::Hold, VoteDecision::Reject, VoteDecision::Approve];

        let mut sums = [0.0_f64; 4];
        for vote in votes {
            sums[vote.decision.rank() as usize] += vote.confidence;
        }

        let mut best = 0usize;
        for (i, &sum) in sums.iter().enumerate().skip(1) {
            if sum >= sums[best] {
                best = i;
            }
        }
        Some(VARIANTS[best])
    }

    /// Record a decision and the votes behind it into the knowledge
    /// graph: a `Decision` entity, an `Agent` entity per distinct voter
    /// (created on first appearance), and a relation from the decision to
    /// each agent — `ApprovedBy` for an approving vote, `RelatedTo`
    /// otherwise, since `RelationType` has no dedicated "rejected by"/
    /// "held by" variant.
    pub fn record_decision(&self, description: &str, decision: VoteDecision, votes: &[Vote], now_ms: u64) -> EntityId {
        let mut graph = self.knowledge_graph.lock().expect("knowledge graph lock poisoned");
        let decision_id = EntityId::new(format!("decision-{now_ms}-{}", graph.len()));

        let mut props = HashMap::new();
        props.insert("decision".to_string(), json!(format!("{decision:?}")));
        props.insert("vote_count".to_string(), json!(votes.len()));
        graph.add_entity(decision_id.clone(), EntityType::Decision, description, props, now_ms);

        for vote in votes {
            let agent_id = EntityId::new(format!("agent-{}", vote.agent_name));
            if graph.get_entity(&agent_id).is_none() {
                graph.add_entity(agent_id.clone(), EntityType::Agent, vote.agent_name.clone(), HashMap::new(), now_ms);
            }

            let relation_type = match vote.decision {
                VoteDecision::Approve | VoteDecision::ApproveWithChanges => RelationType::ApprovedBy,
                VoteDecision::Hold | VoteDecision::Reject => RelationType::RelatedTo,
            };
            let mut rel_props = HashMap::new();
            rel_props.insert("confidence".to_string(), json!(vote.confidence));
            rel_props.insert("rationale".to_string(), json!(vote.rationale));
            let _ = graph.add_relation(decision_id.clone(), agent_id, relation_type, rel_props, vote.confidence, now_ms);
        }

        decision_id
    }

    /// Borrow the knowledge graph, e.g. to query recorded decisions.
    pub fn knowledge_graph(&self) -> std::sync::MutexGuard<'_, KnowledgeGraph> {
        self.knowledge_graph.lock().expect("knowledge graph lock poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vote(agent: &str, decision: VoteDecision, confidence: f64) -> Vote {
        Vote { agent_name: agent.to_string(), decision, confidence, rationale: "because".to_string() }
    }

    #[test]
    fn decompose_chains_sequential_dependencies() {
        let orch = CouncilOrchestrator::new(".");
        let tasks = orch.decompose(&["design schema", "write migration", "backfill data"], 5, 0);

        assert_eq!(tasks.len(), 3);
        assert!(tasks[0].dependencies.is_empty());
        assert_eq!(tasks[1].dependencies, vec![tasks[0].id.clone()]);
        assert_eq!(tasks[2].dependencies, vec![tasks[1].id.clone()]);
    }

    #[test]
    fn aggregate_votes_sums_confidence_per_decision() {
        let votes = vec![
            vote("pm", VoteDecision::Approve, 0.6),
            vote("arch", VoteDecision::Reject, 0.9),
            vote("qa", VoteDecision::Approve, 0.5),
        ];
        assert_eq!(CouncilOrchestrator::aggregate_votes(&votes), Some(VoteDecision::Approve));
    }

    #[test]
    fn aggregate_votes_tie_break_favors_higher_ranked_decision() {
        let votes = vec![vote("pm", VoteDecision::Hold, 0.5), vote("arch", VoteDecision::Approve, 0.5)];
        assert_eq!(CouncilOrchestrator::aggregate_votes(&votes), Some(VoteDecision::Approve));
    }

    #[test]
    fn aggregate_votes_empty_returns_none() {
        assert_eq!(CouncilOrchestrator::aggregate_votes(&[]), None);
    }

    #[test]
    fn record_decision_creates_decision_and_agent_entities() {
        let orch = CouncilOrchestrator::new(".");
        let votes = vec![vote("pm", VoteDecision::Approve, 0.8), vote("arch", VoteDecision::Reject, 0.3)];
        let decision_id = orch.record_decision("ship the migration", VoteDecision::Approve, &votes, 1000);

        let graph = orch.knowledge_graph();
        assert!(graph.get_entity(&decision_id).is_some());
        assert!(graph.get_entity(&EntityId::new("agent-pm")).is_some());
        assert!(graph.get_entity(&EntityId::new("agent-arch")).is_some());
        assert_eq!(graph.relations_of_type(RelationType::ApprovedBy).len(), 1);
        assert_eq!(graph.relations_of_type(RelationType::RelatedTo).len(), 1);
    }

    #[test]
    fn dispatch_with_no_registered_agents_returns_none() {
        let orch = CouncilOrchestrator::new(".");
        let message = A2aMessage {
            message_id: "m1".to_string(),
            from_agent: "orchestrator".to_string(),
            to_agent: "unset".to_string(),
            action: "review".to_string(),
            payload: serde_json::Value::Null,
            timestamp: 0,
            reply_to: None,
            correlation_id: None,
        };
        assert!(orch.dispatch("review", message).is_none());
    }
}
