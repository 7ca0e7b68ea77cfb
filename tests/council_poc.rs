//! Proof of Concept: composability patterns without live API keys.
//!
//! Mirrors the four patterns the council runtime is built to support:
//!
//! 1. **Provider swap** — same `Kernel`, different scripted model backend
//! 2. **State swap** — same session data, different `StateStore` backend
//! 3. **Multi-agent vote aggregation** — several kernels vote, one
//!    decision wins by confidence-weighted tie-break
//! 4. **Decision recording** — the winning decision lands in the
//!    knowledge graph with an entity per voting agent
//!
//! All tests run without API keys using `council-executor::MockProvider`.

use std::sync::Arc;

use council::CouncilOrchestrator;
use council_agent::{Kernel, VoteDecision};
use council_core::effect::Scope;
use council_core::id::SessionId;
use council_core::state::StateStore;
use council_executor::MockProvider;
use council_state_fs::FsStore;
use council_state_memory::MemoryStore;

#[tokio::test]
async fn provider_swap_same_kernel_shape_different_backend() {
    let claude = Arc::new(MockProvider::new());
    claude.set_response("claude-opus", r#"{"decision":"approve","confidence":0.9,"rationale":"looks solid"}"#).await;
    let kernel_a = Kernel::new("reviewer", "You review proposals.", "claude-opus", claude);

    let gemini = Arc::new(MockProvider::new());
    gemini.set_response("gemini-pro", r#"{"decision":"hold","confidence":0.4,"rationale":"needs more detail"}"#).await;
    let kernel_b = Kernel::new("reviewer", "You review proposals.", "gemini-pro", gemini);

    let vote_a = kernel_a.vote("add a caching layer", None).await.unwrap();
    let vote_b = kernel_b.vote("add a caching layer", None).await.unwrap();

    assert_eq!(vote_a.decision, VoteDecision::Approve);
    assert_eq!(vote_b.decision, VoteDecision::Hold);
}

#[tokio::test]
async fn state_swap_same_session_data_different_store() {
    let scope = Scope::Session(SessionId::new("s1"));

    let memory_store: Arc<dyn StateStore> = Arc::new(MemoryStore::new());
    let mut session = council_agent::LLMSession::new(8_000, 0.7);
    session.add_turn("user", "what's the deploy plan?");
    session.add_turn("assistant", "roll out behind a flag first");
    session.persist(memory_store.as_ref(), &scope, "session").await.unwrap();
    let reloaded = council_agent::LLMSession::load(memory_store.as_ref(), &scope, "session", 8_000, 0.7).await.unwrap();
    assert!(reloaded.render().contains("roll out behind a flag first"));

    let dir = tempfile::tempdir().unwrap();
    let fs_store: Arc<dyn StateStore> = Arc::new(FsStore::new(dir.path()));
    session.persist(fs_store.as_ref(), &scope, "session").await.unwrap();
    let reloaded_fs = council_agent::LLMSession::load(fs_store.as_ref(), &scope, "session", 8_000, 0.7).await.unwrap();
    assert!(reloaded_fs.render().contains("roll out behind a flag first"));
}

#[tokio::test]
async fn multi_agent_vote_aggregation_and_decision_recording() {
    let pm_provider = Arc::new(MockProvider::new());
    pm_provider.set_response("pm-model", r#"{"decision":"approve","confidence":0.7,"rationale":"unblocks the roadmap"}"#).await;
    let pm = Kernel::new("pm", "You represent product.", "pm-model", pm_provider);

    let arch_provider = Arc::new(MockProvider::new());
    arch_provider.set_response("arch-model", r#"{"decision":"approve_with_changes","confidence":0.6,"rationale":"needs a migration plan"}"#).await;
    let arch = Kernel::new("arch", "You represent architecture.", "arch-model", arch_provider);

    let qa_provider = Arc::new(MockProvider::new());
    qa_provider.set_response("qa-model", r#"{"decision":"reject","confidence":0.3,"rationale":"no test plan yet"}"#).await;
    let qa = Kernel::new("qa", "You represent QA.", "qa-model", qa_provider);

    let proposal = "ship the new billing schema";
    let votes = vec![
        pm.vote(proposal, None).await.unwrap(),
        arch.vote(proposal, None).await.unwrap(),
        qa.vote(proposal, None).await.unwrap(),
    ];

    let decision = CouncilOrchestrator::aggregate_votes(&votes).unwrap();
    assert_eq!(decision, VoteDecision::Approve);

    let orchestrator = CouncilOrchestrator::new(".");
    let decision_id = orchestrator.record_decision(proposal, decision, &votes, 1_700_000_000_000);

    let graph = orchestrator.knowledge_graph();
    assert!(graph.get_entity(&decision_id).is_some());
    for agent in ["pm", "arch", "qa"] {
        assert!(graph.get_entity(&council_core::id::EntityId::new(format!("agent-{agent}"))).is_some());
    }
}
