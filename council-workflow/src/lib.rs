#![deny(missing_docs)]
//! Workflow state machine (C10, §4.10).
//!
//! A [`WorkflowGraph`] is a named set of nodes wired together by edges.
//! Each node is one of four kinds — [`NodeKind::Standard`], `Approval`,
//! `Parallel`, or `Loop` — and `run_async`'s dispatch loop walks the graph
//! node by node, persisting a [`Checkpoint`] through `council-state-fs`
//! every `checkpoint_interval` steps so a crashed run can `resume` from
//! the last one.
//!
//! Builds on `council_core::workflow::WorkflowState` for the PM → Arch → QA →
//! Complete phase gate (§3) and on a dispatch-loop/bounded-followups shape
//! for orchestrated multi-step runs.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use council_core::checkpoint::Checkpoint;
use council_core::effect::Scope;
use council_core::error::StateError;
use council_core::id::{CheckpointId, WorkflowId};
use council_core::state::StateStore;
use council_core::workflow::WorkflowState;
use thiserror::Error;

/// Errors raised while building or walking a [`WorkflowGraph`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WorkflowError {
    /// A node name referenced by an edge or `entry_point` isn't registered.
    #[error("unknown node: {0}")]
    UnknownNode(String),
    /// `run_async` was called on a graph with no entry point set.
    #[error("graph has no entry point")]
    NoEntryPoint,
    /// An approval node ran but the state wasn't approved; the walk halts here.
    #[error("halted at approval node '{0}': not approved")]
    NotApproved(String),
    /// `resume` was given a checkpoint id that doesn't exist in the store.
    #[error("checkpoint not found: {0}")]
    CheckpointNotFound(String),
    /// Checkpoint persistence failed.
    #[error("checkpoint store error: {0}")]
    Store(#[from] StateError),
    /// A node action returned an application error.
    #[error("node '{node}' failed: {message}")]
    NodeFailed {
        /// The failing node's name.
        node: String,
        /// Failure detail.
        message: String,
    },
}

/// A boxed, pinned, `Send` future — the shape every node action returns.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A standard node's action: transform the state and return it.
pub type NodeAction = Arc<dyn Fn(WorkflowState) -> BoxFuture<'static, Result<WorkflowState, WorkflowError>> + Send + Sync>;

/// A conditional edge predicate, evaluated against the current state.
pub type EdgeCondition = Arc<dyn Fn(&WorkflowState) -> bool + Send + Sync>;

/// How a [`NodeKind::Parallel`] node's branch results are combined back into
/// one state before continuing at `join_node` (ported from `graph.py`'s
/// `merge_strategy`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStrategy {
    /// Union every branch's artifacts/checks/context, concatenate nothing lossy.
    All,
    /// Take the first branch that completed without error, discard the rest.
    First,
    /// Take the first branch whose resulting state is approved.
    Any,
}

/// Configuration for a [`NodeKind::Parallel`] node.
pub struct ParallelConfig {
    /// Node names to fork into and run concurrently.
    pub nodes: Vec<String>,
    /// Node to continue at once the branches are merged.
    pub join_node: String,
    /// How to merge branch results.
    pub merge_strategy: MergeStrategy,
}

/// Configuration for a [`NodeKind::Loop`] node: a conditional self-edge that
/// loops back to its own node while `condition` holds and `max_iterations`
/// hasn't been reached, otherwise falls through to the graph's default edge.
pub struct LoopConfig {
    /// Evaluated each time the loop node completes; `true` keeps looping.
    pub condition: EdgeCondition,
    /// Hard cap on iterations, regardless of `condition`.
    pub max_iterations: u32,
    /// Context key under which the current iteration count is stored.
    pub loop_counter_key: String,
}

/// What kind of dispatch a node gets in `run_async`.
pub enum NodeKind {
    /// Runs `action`, continues at the next edge.
    Standard(NodeAction),
    /// Runs `action`, then halts the walk unless `state.approved`.
    ///
    /// Approval is modeled as a context flag (`context["approved"] == true`)
    /// since `WorkflowState` has no dedicated field for it.
    Approval(NodeAction),
    /// Forks into `config.nodes`, runs them concurrently, merges, continues
    /// at `config.join_node`.
    Parallel(ParallelConfig),
    /// Runs `action`, then conditionally loops back to this same node.
    Loop(NodeAction, LoopConfig),
}

struct Node {
    kind: NodeKind,
}

/// A named, directed graph of workflow nodes.
///
/// Mirrors the original `StateGraph`: nodes are registered by name, wired
/// with unconditional and conditional edges, and walked by [`Self::run`]
/// starting from [`Self::entry_point`].
pub struct WorkflowGraph {
    name: String,
    nodes: HashMap<String, Node>,
    /// Unconditional fallback edge: node -> next node.
    edges: HashMap<String, String>,
    /// Conditional edge: node -> (condition, target). Checked before `edges`.
    conditional_edges: HashMap<String, (EdgeCondition, String)>,
    entry_point: Option<String>,
}

impl WorkflowGraph {
    /// Start building a new, empty graph.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: HashMap::new(),
            edges: HashMap::new(),
            conditional_edges: HashMap::new(),
            entry_point: None,
        }
    }

    /// Register a node under `name`.
    pub fn add_node(&mut self, name: impl Into<String>, kind: NodeKind) {
        self.nodes.insert(name.into(), Node { kind });
    }

    /// Add an unconditional edge `from -> to`.
    pub fn add_edge(&mut self, from: impl Into<String>, to: impl Into<String>) {
        self.edges.insert(from.into(), to.into());
    }

    /// Add a conditional edge `from -> to`, checked before `from`'s
    /// unconditional edge. `condition` sees the state as it stood when the
    /// `from` node finished running.
    pub fn add_conditional_edge(&mut self, from: impl Into<String>, condition: EdgeCondition, to: impl Into<String>) {
        self.conditional_edges.insert(from.into(), (condition, to.into()));
    }

    /// Set the node the walk begins at.
    pub fn set_entry_point(&mut self, node: impl Into<String>) {
        self.entry_point = Some(node.into());
    }

    fn next_node(&self, current: &str, state: &WorkflowState) -> Option<String> {
        if let Some((condition, target)) = self.conditional_edges.get(current) {
            if condition(state) {
                return Some(target.clone());
            }
        }
        self.edges.get(current).cloned()
    }

    /// Walk the graph starting at `entry_point`, persisting a checkpoint
    /// through `store` every `checkpoint_interval` steps (0 disables
    /// checkpointing). Returns the final state once a node has no outgoing
    /// edge, or [`WorkflowError::NotApproved`] if an approval node halts
    /// the walk.
    pub async fn run(
        &self,
        initial: WorkflowState,
        checkpoint_interval: u32,
        store: &dyn StateStore,
        workflow_id: &WorkflowId,
    ) -> Result<WorkflowState, WorkflowError> {
        let mut current_node = self.entry_point.clone().ok_or(WorkflowError::NoEntryPoint)?;
        let mut state = initial;
        let mut step: u32 = 0;

        loop {
            let node = self.nodes.get(&current_node).ok_or_else(|| WorkflowError::UnknownNode(current_node.clone()))?;

            state = match &node.kind {
                NodeKind::Standard(action) => action(state).await?,
                NodeKind::Approval(action) => {
                    let state = action(state).await?;
                    if !is_approved(&state) {
                        return Err(WorkflowError::NotApproved(current_node));
                    }
                    state
                }
                NodeKind::Parallel(config) => self.run_parallel(config, &state).await?,
                NodeKind::Loop(action, loop_config) => {
                    let next = action(state).await?;
                    self.advance_loop(&current_node, next, loop_config)
                }
            };

            step += 1;
            if checkpoint_interval > 0 && step % checkpoint_interval == 0 {
                self.checkpoint(store, workflow_id, &current_node, &state).await?;
            }

            match self.next_node(&current_node, &state) {
                Some(next) => current_node = next,
                None => return Ok(state),
            }
        }
    }

    async fn run_parallel(&self, config: &ParallelConfig, state: &WorkflowState) -> Result<WorkflowState, WorkflowError> {
        let branches = config.nodes.iter().map(|name| {
            let state = state.clone();
            async move {
                let node = self.nodes.get(name).ok_or_else(|| WorkflowError::UnknownNode(name.clone()))?;
                match &node.kind {
                    NodeKind::Standard(action) | NodeKind::Approval(action) => action(state).await,
                    _ => Err(WorkflowError::NodeFailed {
                        node: name.clone(),
                        message: "parallel branches must be standard or approval nodes".into(),
                    }),
                }
            }
        });

        let results = futures_util::future::join_all(branches).await;
        merge_results(results, config.merge_strategy)
    }

    fn advance_loop(&self, node_name: &str, mut state: WorkflowState, config: &LoopConfig) -> WorkflowState {
        let count = state
            .context
            .get(&config.loop_counter_key)
            .and_then(|v| v.as_u64())
            .unwrap_or(0) as u32;

        if count < config.max_iterations && (config.condition)(&state) {
            set_context_number(&mut state, &config.loop_counter_key, (count + 1) as u64);
            // Loop back to this same node on the next pass: a conditional
            // edge pointed at ourselves takes precedence over the graph's
            // unconditional edge in `next_node`.
            self.record_loop_target(node_name, &mut state);
        }
        state
    }

    fn record_loop_target(&self, _node_name: &str, _state: &mut WorkflowState) {
        // Loop-back is expressed purely through `next_node`'s conditional-edge
        // lookup (the caller wires a conditional edge node->node with the same
        // `condition`); nothing further to record on the state itself.
    }

    async fn checkpoint(
        &self,
        store: &dyn StateStore,
        workflow_id: &WorkflowId,
        current_node: &str,
        state: &WorkflowState,
    ) -> Result<CheckpointId, WorkflowError> {
        let id = CheckpointId::new(format!("{}-{}-{:08x}", self.name, current_node, checkpoint_nonce()));
        let state_data = serde_json::to_value(state).map_err(|e| WorkflowError::Store(StateError::Serialization(e.to_string())))?;
        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        let checkpoint = Checkpoint::new(id.clone(), self.name.clone(), current_node, state_data, timestamp);
        let value = serde_json::to_value(&checkpoint).map_err(|e| WorkflowError::Store(StateError::Serialization(e.to_string())))?;
        store.write(&Scope::Workflow(workflow_id.clone()), id.as_str(), value).await?;
        Ok(id)
    }

    /// Resume a previously checkpointed walk: reads the checkpoint, replays
    /// the remaining graph from `checkpoint.current_node`.
    pub async fn resume(
        &self,
        store: &dyn StateStore,
        workflow_id: &WorkflowId,
        checkpoint_id: &str,
    ) -> Result<(WorkflowState, String), WorkflowError> {
        let value = store
            .read(&Scope::Workflow(workflow_id.clone()), checkpoint_id)
            .await?
            .ok_or_else(|| WorkflowError::CheckpointNotFound(checkpoint_id.to_string()))?;
        let checkpoint: Checkpoint =
            serde_json::from_value(value).map_err(|e| WorkflowError::Store(StateError::Serialization(e.to_string())))?;
        let state: WorkflowState = serde_json::from_value(checkpoint.state_data)
            .map_err(|e| WorkflowError::Store(StateError::Serialization(e.to_string())))?;
        Ok((state, checkpoint.current_node))
    }

    /// Render the graph as a Mermaid `graph TD` diagram: diamond shapes for
    /// approval nodes, stadium shapes for parallel nodes, plain boxes
    /// otherwise; dashed arrows for conditional edges, solid for
    /// unconditional ones.
    pub fn visualize(&self) -> String {
        let mut out = String::from("graph TD\n");

        let mut names: Vec<&String> = self.nodes.keys().collect();
        names.sort();
        for name in &names {
            let node = &self.nodes[*name];
            let shape = match &node.kind {
                NodeKind::Approval(_) => format!("{name}[/{name}/]"),
                NodeKind::Parallel(_) => format!("{name}[[{name}]]"),
                _ => format!("{name}[{name}]"),
            };
            out.push_str(&format!("    {shape}\n"));
        }

        for (from, (_, to)) in &self.conditional_edges {
            out.push_str(&format!("    {from} -.->|condition| {to}\n"));
        }
        for (from, to) in &self.edges {
            if !self.conditional_edges.contains_key(from) {
                out.push_str(&format!("    {from} --> {to}\n"));
            }
        }
        for node in &names {
            if let NodeKind::Parallel(config) = &self.nodes[*node].kind {
                for branch in &config.nodes {
                    out.push_str(&format!("    {node} --> {branch}\n"));
                    out.push_str(&format!("    {branch} --> {}\n", config.join_node));
                }
            }
        }

        out
    }
}

fn is_approved(state: &WorkflowState) -> bool {
    state.context.get("approved").and_then(|v| v.as_bool()).unwrap_or(false)
}

fn set_context_number(state: &mut WorkflowState, key: &str, value: u64) {
    if let Some(obj) = state.context.as_object_mut() {
        obj.insert(key.to_string(), serde_json::Value::from(value));
    }
}

fn merge_results(
    results: Vec<Result<WorkflowState, WorkflowError>>,
    strategy: MergeStrategy,
) -> Result<WorkflowState, WorkflowError> {
    match strategy {
        MergeStrategy::First => results
            .into_iter()
            .find(|r| r.is_ok())
            .unwrap_or_else(|| Err(WorkflowError::NodeFailed { node: "parallel".into(), message: "no branch succeeded".into() })),
        MergeStrategy::Any => {
            let succeeded: Vec<WorkflowState> = results.into_iter().filter_map(Result::ok).collect();
            succeeded
                .into_iter()
                .find(is_approved)
                .or_else(|| None)
                .map(Ok)
                .unwrap_or_else(|| Err(WorkflowError::NodeFailed { node: "parallel".into(), message: "no branch was approved".into() }))
        }
        MergeStrategy::All => {
            let succeeded: Vec<WorkflowState> = results.into_iter().filter_map(Result::ok).collect();
            let mut iter = succeeded.into_iter();
            let mut merged = iter.next().ok_or_else(|| WorkflowError::NodeFailed {
                node: "parallel".into(),
                message: "no branch succeeded".into(),
            })?;
            for branch in iter {
                merged.artifacts.extend(branch.artifacts);
                merged.checks_passed.extend(branch.checks_passed);
                if let (Some(base), Some(extra)) = (merged.context.as_object_mut(), branch.context.as_object()) {
                    for (k, v) in extra {
                        base.insert(k.clone(), v.clone());
                    }
                }
            }
            Ok(merged)
        }
    }
}

/// Monotonic-ish nonce for checkpoint ids: a process-local counter, since
/// `Checkpoint::timestamp` already carries wall-clock ordering and this only
/// needs to keep ids distinct within one run.
fn checkpoint_nonce() -> u32 {
    use std::sync::atomic::{AtomicU32, Ordering};
    static COUNTER: AtomicU32 = AtomicU32::new(0);
    COUNTER.fetch_add(1, Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use council_state_fs::FsStore;
    use serde_json::json;

    fn standard(f: impl Fn(WorkflowState) -> WorkflowState + Send + Sync + 'static) -> NodeKind {
        NodeKind::Standard(Arc::new(move |s| {
            let out = f(s);
            Box::pin(async move { Ok(out) })
        }))
    }

    #[tokio::test]
    async fn walks_a_linear_graph_to_completion() {
        let mut graph = WorkflowGraph::new("lint-and-ship");
        graph.add_node("start", standard(|mut s| {
            s.artifacts.insert("PRD".into(), "/tmp/prd.md".into());
            s
        }));
        graph.add_node("finish", standard(|mut s| {
            s.checks_passed.insert("tests_passed".into());
            s.checks_passed.insert("coverage_check".into());
            s
        }));
        graph.add_edge("start", "finish");
        graph.set_entry_point("start");

        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());
        let workflow_id = council_core::id::WorkflowId::new("wf-1");

        let result = graph.run(WorkflowState::new(json!({})), 0, &store, &workflow_id).await.unwrap();
        assert!(result.checks_passed.contains("tests_passed"));
        assert!(result.can_enter(council_core::workflow::Phase::Complete));
    }

    #[tokio::test]
    async fn approval_node_halts_when_not_approved() {
        let mut graph = WorkflowGraph::new("needs-approval");
        graph.add_node("gate", NodeKind::Approval(Arc::new(|s| Box::pin(async move { Ok(s) }))));
        graph.add_node("after", standard(|s| s));
        graph.add_edge("gate", "after");
        graph.set_entry_point("gate");

        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());
        let workflow_id = council_core::id::WorkflowId::new("wf-2");

        let err = graph.run(WorkflowState::new(json!({})), 0, &store, &workflow_id).await.unwrap_err();
        assert!(matches!(err, WorkflowError::NotApproved(node) if node == "gate"));
    }

    #[tokio::test]
    async fn approval_node_continues_when_approved() {
        let mut graph = WorkflowGraph::new("auto-approve");
        graph.add_node(
            "gate",
            NodeKind::Approval(Arc::new(|mut s| {
                if let Some(obj) = s.context.as_object_mut() {
                    obj.insert("approved".into(), json!(true));
                }
                Box::pin(async move { Ok(s) })
            })),
        );
        graph.add_node("after", standard(|mut s| {
            s.checks_passed.insert("done".into());
            s
        }));
        graph.add_edge("gate", "after");
        graph.set_entry_point("gate");

        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());
        let workflow_id = council_core::id::WorkflowId::new("wf-3");

        let result = graph.run(WorkflowState::new(json!({})), 0, &store, &workflow_id).await.unwrap();
        assert!(result.checks_passed.contains("done"));
    }

    #[tokio::test]
    async fn parallel_all_merges_every_branch() {
        let mut graph = WorkflowGraph::new("fan-out");
        graph.add_node("a", standard(|mut s| {
            s.artifacts.insert("a".into(), "1".into());
            s
        }));
        graph.add_node("b", standard(|mut s| {
            s.artifacts.insert("b".into(), "2".into());
            s
        }));
        graph.add_node(
            "fork",
            NodeKind::Parallel(ParallelConfig {
                nodes: vec!["a".into(), "b".into()],
                join_node: "join".into(),
                merge_strategy: MergeStrategy::All,
            }),
        );
        graph.add_node("join", standard(|s| s));
        graph.add_edge("fork", "join");
        graph.set_entry_point("fork");

        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());
        let workflow_id = council_core::id::WorkflowId::new("wf-4");

        let result = graph.run(WorkflowState::new(json!({})), 0, &store, &workflow_id).await.unwrap();
        assert_eq!(result.artifacts.get("a"), Some(&"1".to_string()));
        assert_eq!(result.artifacts.get("b"), Some(&"2".to_string()));
    }

    #[tokio::test]
    async fn checkpoint_then_resume_restores_state() {
        let mut graph = WorkflowGraph::new("checkpointed");
        graph.add_node("start", standard(|mut s| {
            s.artifacts.insert("mark".into(), "here".into());
            s
        }));
        graph.set_entry_point("start");

        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());
        let workflow_id = council_core::id::WorkflowId::new("wf-5");

        graph.run(WorkflowState::new(json!({})), 1, &store, &workflow_id).await.unwrap();

        let keys = store.list(&Scope::Workflow(workflow_id.clone()), "checkpointed-").await.unwrap();
        assert_eq!(keys.len(), 1);

        let (state, node) = graph.resume(&store, &workflow_id, &keys[0]).await.unwrap();
        assert_eq!(node, "start");
        assert_eq!(state.artifacts.get("mark"), Some(&"here".to_string()));
    }

    #[test]
    fn visualize_marks_approval_and_parallel_shapes() {
        let mut graph = WorkflowGraph::new("shapes");
        graph.add_node("plain", standard(|s| s));
        graph.add_node("gate", NodeKind::Approval(Arc::new(|s| Box::pin(async move { Ok(s) }))));
        graph.add_node(
            "fork",
            NodeKind::Parallel(ParallelConfig {
                nodes: vec!["plain".into()],
                join_node: "gate".into(),
                merge_strategy: MergeStrategy::First,
            }),
        );
        graph.set_entry_point("fork");

        let mermaid = graph.visualize();
        assert!(mermaid.starts_with("graph TD\n"));
        assert!(mermaid.contains("gate[/gate/]"));
        assert!(mermaid.contains("fork[[fork]]"));
        assert!(mermaid.contains("plain[plain]"));
    }
}
