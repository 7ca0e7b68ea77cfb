//! WorkflowState data model (§3): the PM → Arch → QA → Complete phase gate
//! that `council-workflow` walks.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

/// Phase of the council workflow.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Phase {
    /// Product/requirements definition.
    PM,
    /// Architecture and design.
    Arch,
    /// Quality assurance.
    QA,
    /// Done.
    Complete,
}

/// State threaded through a council workflow run (§3).
///
/// Invariants (enforced by `council-workflow`, not by this type):
/// - `Arch` requires artifact `"PRD"` or `"implementation_plan"`.
/// - `QA` requires check `"architectural_consensus"`.
/// - `Complete` requires checks `"tests_passed"` and `"coverage_check"`.
/// - Forward transitions require their prerequisite; backward transitions
///   (rollback) are always allowed.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowState {
    /// Current phase.
    pub phase: Phase,
    /// Free-form accumulated context (task description, decisions, …).
    pub context: serde_json::Value,
    /// Artifact name → filesystem path produced so far.
    pub artifacts: HashMap<String, String>,
    /// Named checks that have passed so far.
    pub checks_passed: HashSet<String>,
}

impl WorkflowState {
    /// Start a fresh workflow in the `PM` phase.
    pub fn new(context: serde_json::Value) -> Self {
        Self {
            phase: Phase::PM,
            context,
            artifacts: HashMap::new(),
            checks_passed: HashSet::new(),
        }
    }

    /// Whether the prerequisites for entering `target` are satisfied.
    ///
    /// Rollback (moving to an earlier phase) is always allowed; only
    /// forward transitions are gated.
    pub fn can_enter(&self, target: Phase) -> bool {
        if phase_rank(target) <= phase_rank(self.phase) {
            return true;
        }
        match target {
            Phase::PM => true,
            Phase::Arch => {
                self.artifacts.contains_key("PRD") || self.artifacts.contains_key("implementation_plan")
            }
            Phase::QA => self.checks_passed.contains("architectural_consensus"),
            Phase::Complete => {
                self.checks_passed.contains("tests_passed") && self.checks_passed.contains("coverage_check")
            }
        }
    }
}

fn phase_rank(phase: Phase) -> u8 {
    match phase {
        Phase::PM => 0,
        Phase::Arch => 1,
        Phase::QA => 2,
        Phase::Complete => 3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arch_requires_prd_or_plan() {
        let state = WorkflowState::new(serde_json::Value::Null);
        assert!(!state.can_enter(Phase::Arch));
    }

    #[test]
    fn complete_requires_both_checks() {
        let mut state = WorkflowState::new(serde_json::Value::Null);
        state.checks_passed.insert("tests_passed".into());
        assert!(!state.can_enter(Phase::Complete));
        state.checks_passed.insert("coverage_check".into());
        assert!(state.can_enter(Phase::Complete));
    }

    #[test]
    fn rollback_is_always_allowed() {
        let mut state = WorkflowState::new(serde_json::Value::Null);
        state.phase = Phase::QA;
        assert!(state.can_enter(Phase::PM));
    }
}
