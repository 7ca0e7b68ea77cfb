//! ApprovalRequest and ToolPermission data models (§3, §4.7).

use serde::{Deserialize, Serialize};

use crate::id::RequestId;

/// Risk classification shared by content safety and the action/decision
/// registry (§4.7, §4.9).
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    /// No review required.
    Low,
    /// Review encouraged.
    Medium,
    /// Approval required.
    High,
    /// Approval required, human escalation recommended.
    Critical,
}

/// What an [`ApprovalRequest`] is gating.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalKind {
    /// An action the orchestrator wants to take (e.g. a tool call).
    Action {
        /// The action type, e.g. `"git_push"`.
        action_type: String,
    },
    /// A decision the council wants to ratify (e.g. a workflow phase gate).
    Decision {
        /// The decision type, e.g. `"merge_pr"`.
        decision_type: String,
    },
}

/// A pending or resolved request for human/council sign-off (§3, §4.7).
///
/// Lifecycle: `pending → (approved | rejected)`. High/critical risk actions
/// and decisions must be approved before execution.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRequest {
    /// Unique identifier.
    pub request_id: RequestId,
    /// What is being gated.
    pub kind: ApprovalKind,
    /// Assessed risk level.
    pub risk: RiskLevel,
    /// Human-readable description of what's being requested.
    pub description: String,
    /// Resources this request touches (file paths, service names, …).
    pub affected_resources: Vec<String>,
    /// Why the requestor believes this should be approved.
    pub rationale: String,
    /// Council vote outcome, if auto-approval via consensus was attempted (§4.7).
    pub council_decision: Option<serde_json::Value>,
    /// Who/what raised the request.
    pub requestor: String,
    /// Unix timestamp, milliseconds, of creation.
    pub created_at: u64,
    /// `None` while pending; `Some(true|false)` once resolved.
    pub approved: Option<bool>,
    /// Identity of whoever resolved the request.
    pub approver: Option<String>,
    /// Unix timestamp, milliseconds, of resolution.
    pub approved_at: Option<u64>,
}

impl ApprovalRequest {
    /// Whether this request is still awaiting a decision.
    pub fn is_pending(&self) -> bool {
        self.approved.is_none()
    }
}

/// Allowlist entry governing whether a tool call is permitted (§3).
///
/// Invariant: a tool call is permitted iff the tool is in the allowlist
/// and within the per-session call count and (if paths are given) under
/// one of `allowed_paths`.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolPermission {
    /// Name of the tool this permission governs.
    pub name: String,
    /// Whether the tool may be called at all.
    pub allowed: bool,
    /// Whether each call additionally requires an `ApprovalRequest`.
    pub requires_approval: bool,
    /// Maximum calls allowed within one session. `None` means unbounded.
    pub max_calls_per_session: Option<u32>,
    /// If non-empty, the tool's path argument(s) must fall under one of these.
    #[serde(default)]
    pub allowed_paths: Vec<String>,
}

impl ToolPermission {
    /// Whether `calls_so_far` more calls is still within budget.
    pub fn within_call_budget(&self, calls_so_far: u32) -> bool {
        match self.max_calls_per_session {
            Some(max) => calls_so_far < max,
            None => true,
        }
    }

    /// Whether `path` falls under one of `allowed_paths` (no-op true if unscoped).
    pub fn path_allowed(&self, path: &str) -> bool {
        if self.allowed_paths.is_empty() {
            return true;
        }
        self.allowed_paths.iter().any(|prefix| path.starts_with(prefix.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_budget_is_enforced() {
        let perm = ToolPermission {
            name: "bash".into(),
            allowed: true,
            requires_approval: false,
            max_calls_per_session: Some(3),
            allowed_paths: vec![],
        };
        assert!(perm.within_call_budget(2));
        assert!(!perm.within_call_budget(3));
    }

    #[test]
    fn path_scoping_respects_prefix() {
        let perm = ToolPermission {
            name: "write_file".into(),
            allowed: true,
            requires_approval: false,
            max_calls_per_session: None,
            allowed_paths: vec!["/workspace".into()],
        };
        assert!(perm.path_allowed("/workspace/src/main.rs"));
        assert!(!perm.path_allowed("/etc/passwd"));
    }
}
