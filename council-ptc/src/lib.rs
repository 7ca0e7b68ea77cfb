#![deny(missing_docs)]
//! PTC Executor (C3, §4.3): one script, one inference, a batch of tool calls.
//!
//! Pipeline: static validation (see [`validator`]) → pre-hook dispatch via
//! `council-hooks` → sandboxed execution via `council-sandbox` → output
//! reduction via `council-reducer`. Same stage order as the original
//! `EnhancedPTCExecutor`, reimplemented without the Docker-specific wiring
//! (§1 places concrete sandbox backends out of scope; this crate composes
//! whatever `Sandbox` the caller hands it).

mod validator;

pub use validator::CodeValidator;

use std::time::Duration;

use council_core::error::PtcError;
use council_core::hook::{HookAction, HookContext, HookType};
use council_hooks::HookManager;
use council_reducer::DataReducer;
use council_sandbox::{ExecutionStatus, Sandbox};
use serde::{Deserialize, Serialize};

/// Per-call token accounting, accumulated across a session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenStats {
    /// Characters of raw sandbox output before reduction.
    pub original_chars: u64,
    /// Characters of the reduced summary.
    pub summary_chars: u64,
    /// `original_chars - summary_chars`.
    pub saved_chars: u64,
}

impl TokenStats {
    /// `saved / (original + saved)`, i.e. the fraction of output never surfaced.
    pub fn savings_rate(&self) -> f64 {
        let total = self.original_chars + self.saved_chars;
        if total == 0 {
            0.0
        } else {
            self.saved_chars as f64 / total as f64
        }
    }
}

/// Outcome of a single PTC execution (§4.3). Callers only ever see a
/// summary — full sandbox output never reaches the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PtcResult {
    /// Whether the script validated, was allowed, and exited 0.
    pub success: bool,
    /// The reduced summary (or a violation/block message on early failure).
    pub summary: String,
    /// Fraction of raw output eliminated by reduction, clamped to `[0, 1]`.
    pub token_saved: f64,
    /// Wall-clock time spent in the sandbox.
    pub execution_time: council_core::duration::DurationMs,
    /// Which sandbox provider ran the script.
    pub sandbox_used: String,
    /// Anomaly descriptions extracted from the combined output.
    pub anomalies: Vec<String>,
    /// Accounting for this single call.
    pub token_stats: TokenStats,
}

impl PtcResult {
    fn rejected(reason: String) -> Self {
        Self {
            success: false,
            summary: reason,
            token_saved: 0.0,
            execution_time: council_core::duration::DurationMs::ZERO,
            sandbox_used: "none".to_string(),
            anomalies: Vec::new(),
            token_stats: TokenStats::default(),
        }
    }
}

/// Runs PTC scripts through validate → pre-hook → sandbox → reduce (§4.3).
pub struct PtcExecutor<S: Sandbox> {
    validator: CodeValidator,
    sandbox: S,
    reducer: DataReducer,
    timeout: Duration,
}

impl<S: Sandbox> PtcExecutor<S> {
    /// Build an executor over a concrete sandbox provider.
    pub fn new(sandbox: S, max_summary_chars: usize, timeout: Duration) -> Self {
        Self {
            validator: CodeValidator::default(),
            sandbox,
            reducer: DataReducer::new(max_summary_chars),
            timeout,
        }
    }

    /// Run `code` through the full pipeline. `hooks`/`ctx` drive step 2
    /// (pre-tool-use dispatch against `tool_name = "execute_batch"`); `now_ms`
    /// stamps the hook result.
    pub async fn execute(
        &self,
        code: &str,
        hooks: &HookManager,
        ctx: &mut HookContext,
        now_ms: u64,
    ) -> Result<PtcResult, PtcError> {
        let violations = self.validator.validate(code);
        if !violations.is_empty() {
            return Ok(PtcResult::rejected(format!("security violation: {}", violations.join("; "))));
        }

        ctx.tool_name = Some("execute_batch".to_string());
        let hook_result = hooks.trigger(&HookType::PreToolUse, ctx, 0, true, now_ms).await;
        if hook_result.action == HookAction::Block {
            return Err(PtcError::HookBlocked { hook: "pre_tool_use".to_string(), reason: hook_result.message });
        }

        let started = std::time::Instant::now();
        let sandbox_result = self.sandbox.run(code, self.timeout).await;
        let execution_time = council_core::duration::DurationMs::from(started.elapsed());

        let combined = format!("{}{}", sandbox_result.stdout, sandbox_result.stderr);
        let summary = self.reducer.reduce(&sandbox_result.stdout, &sandbox_result.stderr);
        let anomalies = self
            .reducer
            .extract_anomalies(&combined)
            .into_iter()
            .map(|a| a.description)
            .collect();

        let original_chars = combined.chars().count() as u64;
        let summary_chars = summary.chars().count() as u64;
        let token_saved = if original_chars == 0 {
            0.0
        } else {
            (1.0 - summary_chars as f64 / original_chars.max(1) as f64).max(0.0)
        };

        Ok(PtcResult {
            success: sandbox_result.status == ExecutionStatus::Success,
            summary,
            token_saved,
            execution_time,
            sandbox_used: sandbox_result.execution_mode,
            anomalies,
            token_stats: TokenStats {
                original_chars,
                summary_chars,
                saved_chars: original_chars.saturating_sub(summary_chars),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use council_sandbox::LocalSandbox;

    fn ctx() -> HookContext {
        HookContext::new(HookType::PreToolUse, "s1", "architect", "/work")
    }

    #[tokio::test]
    async fn forbidden_import_is_rejected_before_sandbox_runs() {
        let dir = tempfile::tempdir().unwrap();
        let executor = PtcExecutor::new(LocalSandbox::new("bash", dir.path()), 2000, Duration::from_secs(5));
        let hooks = HookManager::new();
        let result = executor.execute("import subprocess\n", &hooks, &mut ctx(), 1).await.unwrap();
        assert!(!result.success);
        assert!(result.summary.contains("security violation"));
        assert_eq!(result.sandbox_used, "none");
    }

    #[tokio::test]
    async fn clean_script_runs_and_reduces_output() {
        let dir = tempfile::tempdir().unwrap();
        let executor = PtcExecutor::new(LocalSandbox::new("bash", dir.path()), 2000, Duration::from_secs(5));
        let hooks = HookManager::new();
        let result = executor.execute("echo hello", &hooks, &mut ctx(), 1).await.unwrap();
        assert!(result.success);
        assert!(result.summary.contains("hello"));
    }
}
