#![deny(missing_docs)]
//! Governance Gateway (C7, §4.7): risk classification, the approval queue,
//! and the tool allowlist.
//!
//! Two assessment surfaces feed [`RiskLevel`]: a content-safety regex scan
//! and a fixed `ActionType`/`DecisionType` → risk table. High/critical risk
//! always needs an explicit approval; medium risk may auto-approve via a
//! council vote quorum (the "wald score", §9 Open Questions).

use std::collections::HashMap;
use std::sync::LazyLock;

use council_core::approval::{ApprovalKind, ApprovalRequest, RiskLevel, ToolPermission};
use council_core::error::GovernanceError;
use council_core::id::RequestId;
use regex::Regex;

/// A single vote cast by a council member on a pending decision.
#[derive(Debug, Clone)]
pub struct Vote {
    /// `"approve"`, `"approve_with_changes"`, or `"reject"`.
    pub decision: String,
    /// Confidence in `[0, 1]`, used as the vote's weight.
    pub confidence: f64,
}

/// Computes the bounded wald statistic for a set of council votes (§9).
///
/// `wald = (approve_weight - reject_weight) / total_weight`, in `[-1, 1]`.
/// Returns 0 when no votes were cast.
pub fn wald_score(votes: &[Vote]) -> f64 {
    let mut approve_weight = 0.0;
    let mut reject_weight = 0.0;
    let mut total_weight = 0.0;

    for vote in votes {
        total_weight += vote.confidence;
        match vote.decision.as_str() {
            "approve" | "approve_with_changes" => approve_weight += vote.confidence,
            "reject" => reject_weight += vote.confidence,
            _ => {}
        }
    }

    if total_weight == 0.0 {
        0.0
    } else {
        (approve_weight - reject_weight) / total_weight
    }
}

/// Tunables for auto-approval quorum and allowlist defaults.
#[derive(Debug, Clone)]
pub struct GovernanceConfig {
    /// Minimum wald score for medium-risk auto-approval (default 0.34,
    /// approximating a 2/3 supermajority on a `[-1, 1]` scale).
    pub wald_quorum: f64,
    /// Minimum vote count for medium-risk auto-approval (default 3).
    pub min_votes: usize,
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self { wald_quorum: 0.34, min_votes: 3 }
    }
}

struct ContentPattern {
    regex: Regex,
    risk: RiskLevel,
}

static CONTENT_SAFETY_PATTERNS: LazyLock<Vec<ContentPattern>> = LazyLock::new(|| {
    [
        (r"(?i)\brm\s+-rf\s+/", RiskLevel::Critical),
        (r"(?i)\bdrop\s+(table|database)\b", RiskLevel::Critical),
        (r"(?i)\bdelete\s+from\s+\w+\s*(?:;|$)", RiskLevel::High),
        (r"(?i)\bforce[- ]?push\b", RiskLevel::High),
        (r"(?i)\bproduction\b", RiskLevel::Medium),
        (r"(?i)\bcredentials?\b|\bsecrets?\b", RiskLevel::Medium),
    ]
    .into_iter()
    .map(|(pattern, risk)| ContentPattern { regex: Regex::new(pattern).expect("static pattern is valid"), risk })
    .collect()
});

/// Highest risk matched in `text` by the content-safety pattern list, or
/// [`RiskLevel::Low`] if nothing matched.
pub fn content_safety_risk(text: &str) -> RiskLevel {
    CONTENT_SAFETY_PATTERNS
        .iter()
        .filter(|p| p.regex.is_match(text))
        .map(|p| p.risk)
        .max()
        .unwrap_or(RiskLevel::Low)
}

/// Fixed risk mapping for a named action type (§4.7 action/decision registry).
pub fn action_risk(action_type: &str) -> RiskLevel {
    match action_type {
        "git_push" | "deploy" | "delete_file" | "modify_permissions" => RiskLevel::High,
        "git_force_push" | "drop_database" | "revoke_credentials" => RiskLevel::Critical,
        "write_file" | "run_tests" | "create_branch" => RiskLevel::Medium,
        _ => RiskLevel::Low,
    }
}

/// Fixed risk mapping for a named decision type.
pub fn decision_risk(decision_type: &str) -> RiskLevel {
    match decision_type {
        "merge_pr" | "phase_transition" | "release_approval" => RiskLevel::High,
        "architectural_consensus" => RiskLevel::Medium,
        _ => RiskLevel::Low,
    }
}

/// The approval authority for high/critical actions and decisions (§4.7).
pub struct GovernanceGateway {
    config: GovernanceConfig,
    requests: HashMap<String, ApprovalRequest>,
}

impl GovernanceGateway {
    /// Create a gateway with the given quorum configuration.
    pub fn new(config: GovernanceConfig) -> Self {
        Self { config, requests: HashMap::new() }
    }

    /// File a new pending request.
    #[allow(clippy::too_many_arguments)]
    pub fn create_request(
        &mut self,
        request_id: RequestId,
        kind: ApprovalKind,
        risk: RiskLevel,
        description: impl Into<String>,
        affected_resources: Vec<String>,
        rationale: impl Into<String>,
        requestor: impl Into<String>,
        now_ms: u64,
    ) -> &ApprovalRequest {
        let request = ApprovalRequest {
            request_id: request_id.clone(),
            kind,
            risk,
            description: description.into(),
            affected_resources,
            rationale: rationale.into(),
            council_decision: None,
            requestor: requestor.into(),
            created_at: now_ms,
            approved: None,
            approver: None,
            approved_at: None,
        };
        self.requests.insert(request_id.as_str().to_string(), request);
        self.requests.get(request_id.as_str()).expect("just inserted")
    }

    /// Attempt medium-risk auto-approval via council vote quorum (§9).
    /// No-op (returns `false`) for non-medium risk or insufficient votes.
    pub fn try_auto_approve(&mut self, request_id: &RequestId, votes: &[Vote], now_ms: u64) -> bool {
        let Some(request) = self.requests.get(request_id.as_str()) else {
            return false;
        };
        if request.risk != RiskLevel::Medium || votes.len() < self.config.min_votes {
            return false;
        }
        let score = wald_score(votes);
        if score < self.config.wald_quorum {
            return false;
        }

        if let Some(request) = self.requests.get_mut(request_id.as_str()) {
            request.approved = Some(true);
            request.approver = Some("council-auto-approval".to_string());
            request.approved_at = Some(now_ms);
            request.council_decision = Some(serde_json::json!({"wald_score": score, "votes": votes.len()}));
        }
        tracing::info!(request_id = %request_id, score, "medium-risk request auto-approved by council quorum");
        true
    }

    /// Approve a pending request.
    pub fn approve(&mut self, request_id: &RequestId, approver: impl Into<String>, now_ms: u64) -> Result<(), GovernanceError> {
        let request = self.requests.get_mut(request_id.as_str()).ok_or_else(|| {
            GovernanceError::Other(format!("no such request: {request_id}"))
        })?;
        request.approved = Some(true);
        request.approver = Some(approver.into());
        request.approved_at = Some(now_ms);
        Ok(())
    }

    /// Reject a pending request.
    pub fn reject(&mut self, request_id: &RequestId, approver: impl Into<String>, reason: impl Into<String>, now_ms: u64) -> Result<(), GovernanceError> {
        let request = self.requests.get_mut(request_id.as_str()).ok_or_else(|| {
            GovernanceError::Other(format!("no such request: {request_id}"))
        })?;
        request.approved = Some(false);
        request.approver = Some(approver.into());
        request.approved_at = Some(now_ms);
        let _ = reason.into();
        Ok(())
    }

    /// Look up a request by id.
    pub fn get(&self, request_id: &RequestId) -> Option<&ApprovalRequest> {
        self.requests.get(request_id.as_str())
    }

    /// All requests still awaiting a decision.
    pub fn pending(&self) -> Vec<&ApprovalRequest> {
        self.requests.values().filter(|r| r.is_pending()).collect()
    }
}

/// Per-session tool-call allowlist (§3 invariant: a tool call is permitted
/// iff allowed, within its call budget, and under an allowed path prefix).
pub struct ToolAllowlist {
    permissions: HashMap<String, ToolPermission>,
    call_counts: HashMap<String, u32>,
}

impl ToolAllowlist {
    /// Create an empty allowlist — no tool is permitted until registered.
    pub fn new() -> Self {
        Self { permissions: HashMap::new(), call_counts: HashMap::new() }
    }

    /// Register (or replace) a tool's permission entry.
    pub fn register(&mut self, permission: ToolPermission) {
        self.permissions.insert(permission.name.clone(), permission);
    }

    /// Check whether `tool` may be called with the given `path` (if any),
    /// and record the call if permitted.
    pub fn check_and_record(&mut self, tool: &str, path: Option<&str>) -> Result<(), GovernanceError> {
        let permission = self.permissions.get(tool).ok_or_else(|| GovernanceError::ToolNotPermitted {
            tool: tool.to_string(),
            reason: "not in allowlist".to_string(),
        })?;

        if !permission.allowed {
            return Err(GovernanceError::ToolNotPermitted { tool: tool.to_string(), reason: "explicitly disallowed".to_string() });
        }

        let calls_so_far = *self.call_counts.get(tool).unwrap_or(&0);
        if !permission.within_call_budget(calls_so_far) {
            return Err(GovernanceError::ToolNotPermitted { tool: tool.to_string(), reason: "call budget exhausted".to_string() });
        }

        if let Some(path) = path {
            if !permission.path_allowed(path) {
                return Err(GovernanceError::ToolNotPermitted { tool: tool.to_string(), reason: format!("path '{path}' not in allowed scope") });
            }
        }

        *self.call_counts.entry(tool.to_string()).or_insert(0) += 1;
        Ok(())
    }
}

impl Default for ToolAllowlist {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_safety_flags_destructive_text() {
        assert_eq!(content_safety_risk("please run rm -rf / now"), RiskLevel::Critical);
        assert_eq!(content_safety_risk("everything looks fine"), RiskLevel::Low);
    }

    #[test]
    fn wald_score_rewards_unanimous_approval() {
        let votes = vec![
            Vote { decision: "approve".into(), confidence: 0.9 },
            Vote { decision: "approve".into(), confidence: 0.8 },
            Vote { decision: "approve".into(), confidence: 0.7 },
        ];
        assert_eq!(wald_score(&votes), 1.0);
    }

    #[test]
    fn medium_risk_auto_approves_above_quorum() {
        let mut gateway = GovernanceGateway::new(GovernanceConfig::default());
        let id = RequestId::new("req-1");
        gateway.create_request(
            id.clone(),
            ApprovalKind::Action { action_type: "write_file".into() },
            RiskLevel::Medium,
            "write config",
            vec!["config.toml".into()],
            "routine update",
            "architect",
            1,
        );

        let votes = vec![
            Vote { decision: "approve".into(), confidence: 0.9 },
            Vote { decision: "approve".into(), confidence: 0.8 },
            Vote { decision: "approve".into(), confidence: 0.8 },
        ];
        assert!(gateway.try_auto_approve(&id, &votes, 2));
        assert_eq!(gateway.get(&id).unwrap().approved, Some(true));
    }

    #[test]
    fn high_risk_never_auto_approves() {
        let mut gateway = GovernanceGateway::new(GovernanceConfig::default());
        let id = RequestId::new("req-2");
        gateway.create_request(
            id.clone(),
            ApprovalKind::Action { action_type: "deploy".into() },
            RiskLevel::High,
            "deploy to prod",
            vec![],
            "release",
            "architect",
            1,
        );
        let votes = vec![
            Vote { decision: "approve".into(), confidence: 1.0 },
            Vote { decision: "approve".into(), confidence: 1.0 },
            Vote { decision: "approve".into(), confidence: 1.0 },
        ];
        assert!(!gateway.try_auto_approve(&id, &votes, 2));
        assert!(gateway.get(&id).unwrap().is_pending());
    }

    #[test]
    fn allowlist_enforces_call_budget_and_path_scope() {
        let mut allowlist = ToolAllowlist::new();
        allowlist.register(ToolPermission {
            name: "write_file".into(),
            allowed: true,
            requires_approval: false,
            max_calls_per_session: Some(1),
            allowed_paths: vec!["/workspace".into()],
        });

        assert!(allowlist.check_and_record("write_file", Some("/workspace/a.rs")).is_ok());
        assert!(allowlist.check_and_record("write_file", Some("/workspace/b.rs")).is_err());
    }

    #[test]
    fn unregistered_tool_is_rejected() {
        let mut allowlist = ToolAllowlist::new();
        assert!(allowlist.check_and_record("bash", None).is_err());
    }
}
