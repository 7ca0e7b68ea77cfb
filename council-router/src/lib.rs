#![deny(missing_docs)]
//! Adaptive Router: keyword-weighted risk assessment blended with blast-radius
//! impact, routing a task to single-model, swarm-verify, or full-council review.
//!
//! Ported near-verbatim from the original `AdaptiveRouter`'s keyword lists and
//! decision table; the risk/impact blend now consults `council-blast-radius`'s
//! 3-bucket `ImpactLevel` (§4.8's authoritative scale) rather than the
//! original's 5-bucket one.

use std::sync::LazyLock;

use council_blast_radius::{BlastRadiusAnalyzer, ImpactLevel};
use council_core::approval::RiskLevel;
use regex::Regex;

static HIGH_RISK_KEYWORDS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"(?i)\bgit\s+push\b", r"(?i)\bdeploy\b", r"(?i)\bproduction\b", r"(?i)\bdelete\b",
        r"(?i)\bdrop\s+table\b", r"(?i)\brm\s+-rf\b", r"(?i)\.env\b", r"(?i)\bsecret\b",
        r"(?i)\bapi[_-]?key\b", r"(?i)\bpassword\b", r"(?i)\btoken\b", r"(?i)\bcredential\b",
        r"(?i)\bdatabase\b", r"(?i)\bmigration\b",
    ])
});

static MEDIUM_RISK_KEYWORDS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"(?i)\brefactor\b", r"(?i)\bmerge\b", r"(?i)\brewrite\b", r"(?i)\bbreaking\s+change\b",
        r"(?i)\bapi\b", r"(?i)\bschema\b", r"(?i)\bconfig\b", r"(?i)\bauth\b", r"(?i)\blogin\b",
        r"(?i)\bpayment\b",
    ])
});

static LOW_RISK_KEYWORDS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"(?i)\btypo\b", r"(?i)\bfix\s+lint\b", r"(?i)\bformat\b", r"(?i)\bcomment\b",
        r"(?i)\bdoc\b", r"(?i)\breadme\b", r"(?i)\btest\b",
    ])
});

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns.iter().map(|p| Regex::new(p).expect("static pattern is valid")).collect()
}

/// Which execution path a task is routed to.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseMode {
    /// A single model answers directly.
    SingleModel,
    /// A swarm of models vote, gated by the wald-score quorum.
    SwarmVerify,
    /// Full council deliberation (and, at critical risk, human sign-off).
    FullCouncil,
}

/// The outcome of [`AdaptiveRouter::route`].
#[derive(Debug, Clone)]
pub struct RoutingDecision {
    /// The chosen response mode.
    pub mode: ResponseMode,
    /// The assessed risk driving the decision.
    pub risk_level: RiskLevel,
    /// Human-readable justification.
    pub reason: String,
    /// Approvers this decision requires before acting (e.g. `"human"` at critical risk).
    pub required_approvers: Vec<String>,
}

/// Routes a task description to a response mode based on keyword risk and,
/// optionally, blast-radius impact of the files it touches.
pub struct AdaptiveRouter {
    blast_analyzer: BlastRadiusAnalyzer,
}

impl AdaptiveRouter {
    /// Create a router whose blast-radius analysis is rooted at `project_root`.
    pub fn new(project_root: impl Into<std::path::PathBuf>) -> Self {
        Self { blast_analyzer: BlastRadiusAnalyzer::new(project_root) }
    }

    /// Assess risk from keywords in `task`/`context`, optionally blended with
    /// the blast radius of `affected_files` (the higher of the two wins).
    pub fn assess_risk(&mut self, task: &str, context: Option<&str>, affected_files: Option<&[String]>) -> RiskLevel {
        let text = format!("{task} {}", context.unwrap_or(""));

        let keyword_risk = if HIGH_RISK_KEYWORDS.iter().any(|re| re.is_match(&text)) {
            RiskLevel::High
        } else if MEDIUM_RISK_KEYWORDS.iter().any(|re| re.is_match(&text)) {
            RiskLevel::Medium
        } else if LOW_RISK_KEYWORDS.iter().any(|re| re.is_match(&text)) {
            RiskLevel::Low
        } else {
            RiskLevel::Medium
        };

        let Some(files) = affected_files else {
            return keyword_risk;
        };
        if files.is_empty() {
            return keyword_risk;
        }

        let impact = self.blast_analyzer.calculate_impact(files);
        let blast_risk = match impact.level {
            ImpactLevel::Low => RiskLevel::Low,
            ImpactLevel::Medium => RiskLevel::Medium,
            ImpactLevel::High => RiskLevel::High,
        };

        keyword_risk.max(blast_risk)
    }

    /// Route `task` (with optional extra `context`) to a response mode.
    pub fn route(&mut self, task: &str, context: Option<&str>) -> RoutingDecision {
        let risk = self.assess_risk(task, context, None);
        self.decision_for(risk)
    }

    /// Route, blending in blast-radius impact of `affected_files`.
    pub fn route_with_impact(&mut self, task: &str, context: Option<&str>, affected_files: &[String]) -> RoutingDecision {
        let risk = self.assess_risk(task, context, Some(affected_files));
        self.decision_for(risk)
    }

    fn decision_for(&self, risk: RiskLevel) -> RoutingDecision {
        match risk {
            RiskLevel::Low => RoutingDecision {
                mode: ResponseMode::SingleModel,
                risk_level: risk,
                reason: "low-risk task, routed to a single model for a fast response".to_string(),
                required_approvers: vec![],
            },
            RiskLevel::Medium => RoutingDecision {
                mode: ResponseMode::SwarmVerify,
                risk_level: risk,
                reason: "medium-risk task, routed to swarm verification with wald-score quorum".to_string(),
                required_approvers: vec!["wald_score".to_string()],
            },
            RiskLevel::High => RoutingDecision {
                mode: ResponseMode::FullCouncil,
                risk_level: risk,
                reason: "high-risk task, requires full council deliberation".to_string(),
                required_approvers: vec!["wald_score".to_string(), "codex_review".to_string()],
            },
            RiskLevel::Critical => RoutingDecision {
                mode: ResponseMode::FullCouncil,
                risk_level: risk,
                reason: "critical task, requires full council deliberation plus human sign-off".to_string(),
                required_approvers: vec!["wald_score".to_string(), "codex_review".to_string(), "human".to_string()],
            },
        }
    }

    /// Render a human-readable explanation of a routing decision.
    pub fn explain_decision(decision: &RoutingDecision) -> String {
        let mut lines = vec![
            "=== ROUTING DECISION ===".to_string(),
            format!("Risk Level: {:?}", decision.risk_level),
            format!("Response Mode: {:?}", decision.mode),
            format!("Reason: {}", decision.reason),
        ];
        if !decision.required_approvers.is_empty() {
            lines.push(format!("Required Approvers: {}", decision.required_approvers.join(", ")));
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn high_risk_keyword_routes_to_full_council() {
        let dir = tempfile::tempdir().unwrap();
        let mut router = AdaptiveRouter::new(dir.path());
        let decision = router.route("deploy to production", None);
        assert_eq!(decision.mode, ResponseMode::FullCouncil);
        assert_eq!(decision.risk_level, RiskLevel::High);
    }

    #[test]
    fn low_risk_keyword_routes_to_single_model() {
        let dir = tempfile::tempdir().unwrap();
        let mut router = AdaptiveRouter::new(dir.path());
        let decision = router.route("fix a typo in the readme", None);
        assert_eq!(decision.mode, ResponseMode::SingleModel);
    }

    #[test]
    fn blast_radius_can_upgrade_risk() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("core.py"), "X = 1\n").unwrap();
        for i in 0..5 {
            std::fs::write(dir.path().join(format!("u{i}.py")), "import core\n").unwrap();
        }

        let mut router = AdaptiveRouter::new(dir.path());
        let decision = router.route_with_impact("fix a typo", None, &["core.py".to_string()]);
        assert_eq!(decision.risk_level, RiskLevel::High);
    }
}
