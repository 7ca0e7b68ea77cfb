//! PostToolUseHook (§4.6, priority 100): format/lint/test quality gate chain.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use council_core::error::HookError;
use council_core::hook::{Hook, HookAction, HookContext, HookResult, HookType};

const FILE_TOOLS: &[&str] = &["write_file", "edit_file", "replace_file", "create_file", "modify_file"];
const PATH_KEYS: &[&str] = &["path", "file", "filepath", "filename", "target_file"];

struct QualityGateResult {
    passed: bool,
    gate_name: &'static str,
    output: String,
    error: String,
}

/// Runs format, lint, and (optionally) test gates after a file-mutating
/// tool call, retrying up to `max_retries` before escalating to a block.
/// Fires at [`HookType::PostToolUse`].
pub struct PostToolUseHook {
    working_dir: std::path::PathBuf,
    enable_format: bool,
    enable_lint: bool,
    enable_test: bool,
    test_command: String,
    lint_command: String,
    format_command: String,
    max_retries: u32,
    priority: u32,
    points: Vec<HookType>,
    retry_count: AtomicU32,
}

impl PostToolUseHook {
    /// Build the hook with its defaults (format + lint on, test off).
    pub fn new(working_dir: impl Into<std::path::PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
            enable_format: true,
            enable_lint: true,
            enable_test: false,
            test_command: "cargo test".to_string(),
            lint_command: "cargo clippy -- -D warnings".to_string(),
            format_command: "cargo fmt -- --check".to_string(),
            max_retries: 3,
            priority: 100,
            points: vec![HookType::PostToolUse],
            retry_count: AtomicU32::new(0),
        }
    }

    /// Enable the test gate, which is off by default.
    pub fn with_test_gate(mut self, command: impl Into<String>) -> Self {
        self.enable_test = true;
        self.test_command = command.into();
        self
    }

    fn extract_modified_files(args: &serde_json::Value) -> Vec<String> {
        let Some(obj) = args.as_object() else {
            return Vec::new();
        };
        PATH_KEYS
            .iter()
            .filter_map(|k| obj.get(*k).and_then(|v| v.as_str()))
            .filter(|p| p.ends_with(".rs"))
            .map(str::to_string)
            .collect()
    }

    async fn run_gate(&self, gate_name: &'static str, command: &str) -> QualityGateResult {
        let mut parts = command.split_whitespace();
        let Some(program) = parts.next() else {
            return QualityGateResult { passed: true, gate_name, output: String::new(), error: String::new() };
        };
        let output = tokio::process::Command::new(program)
            .args(parts)
            .current_dir(&self.working_dir)
            .output()
            .await;

        match output {
            Ok(output) => QualityGateResult {
                passed: output.status.success(),
                gate_name,
                output: String::from_utf8_lossy(&output.stdout).into_owned(),
                error: String::from_utf8_lossy(&output.stderr).into_owned(),
            },
            Err(e) => QualityGateResult {
                passed: false,
                gate_name,
                output: String::new(),
                error: e.to_string(),
            },
        }
    }
}

#[async_trait]
impl Hook for PostToolUseHook {
    fn points(&self) -> &[HookType] {
        &self.points
    }

    fn priority(&self) -> u32 {
        self.priority
    }

    async fn on_event(&self, ctx: &HookContext) -> Result<HookResult, HookError> {
        let tool_name = ctx.tool_name.as_deref().unwrap_or("");
        if !FILE_TOOLS.contains(&tool_name) {
            return Ok(HookResult::allow("not a file-mutating tool, gates skipped", 0));
        }

        let modified: HashSet<String> = ctx
            .tool_args
            .as_ref()
            .map(Self::extract_modified_files)
            .unwrap_or_default()
            .into_iter()
            .collect();
        if modified.is_empty() {
            return Ok(HookResult::allow("no source files modified, gates skipped", 0));
        }

        let mut gates = Vec::new();
        if self.enable_format {
            gates.push(self.run_gate("format", &self.format_command).await);
        }
        if self.enable_lint && gates.iter().all(|g: &QualityGateResult| g.passed) {
            gates.push(self.run_gate("lint", &self.lint_command).await);
        }
        if self.enable_test && gates.iter().all(|g: &QualityGateResult| g.passed) {
            gates.push(self.run_gate("test", &self.test_command).await);
        }

        let failed: Vec<&QualityGateResult> = gates.iter().filter(|g| !g.passed).collect();
        if failed.is_empty() {
            self.retry_count.store(0, Ordering::SeqCst);
            return Ok(HookResult::allow("all quality gates passed", 0));
        }

        let errors: Vec<String> = failed
            .iter()
            .map(|g| format!("{}: {}", g.gate_name, g.error))
            .collect();

        let attempt = self.retry_count.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt >= self.max_retries {
            self.retry_count.store(0, Ordering::SeqCst);
            let mut result = HookResult::block(format!("quality gates failed after {attempt} attempts"), 0);
            result.metadata = serde_json::json!({"errors": errors});
            return Ok(result);
        }

        Ok(HookResult {
            action: HookAction::Retry,
            message: format!("quality gates failed, retry {attempt}/{}", self.max_retries),
            metadata: serde_json::json!({"self_healing": true, "errors": errors}),
            modified_data: None,
            error: None,
            timestamp: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx_for(tool_name: &str, path: &str) -> HookContext {
        let mut ctx = HookContext::new(HookType::PostToolUse, "s1", "architect", "/work");
        ctx.tool_name = Some(tool_name.to_string());
        ctx.tool_args = Some(serde_json::json!({"path": path}));
        ctx
    }

    #[tokio::test]
    async fn non_file_tool_skips_gates() {
        let hook = PostToolUseHook::new(".");
        let mut ctx = HookContext::new(HookType::PostToolUse, "s1", "architect", "/work");
        ctx.tool_name = Some("read_file".to_string());
        let result = hook.on_event(&ctx).await.unwrap();
        assert_eq!(result.action, HookAction::Allow);
        assert_eq!(result.message, "not a file-mutating tool, gates skipped");
    }

    #[tokio::test]
    async fn non_rust_file_skips_gates() {
        let hook = PostToolUseHook::new(".");
        let ctx = ctx_for("write_file", "README.md");
        let result = hook.on_event(&ctx).await.unwrap();
        assert_eq!(result.action, HookAction::Allow);
        assert_eq!(result.message, "no source files modified, gates skipped");
    }
}
