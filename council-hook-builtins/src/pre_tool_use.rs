//! PreToolUseHook (§4.6, priority 50): dangerous-command and sensitive-path guardrail.

use async_trait::async_trait;
use council_core::error::HookError;
use council_core::hook::{Hook, HookAction, HookContext, HookResult, HookType};
use regex::Regex;

const DANGEROUS_COMMANDS: &[&str] = &[
    "rm -rf", "rm -r /", "rm -rf /", "dd if=", "mkfs", "format c:", "> /dev/sda",
    "chmod -R 777", "chmod 777 /",
];

const SENSITIVE_PATHS: &[&str] = &[
    ".ssh", ".ssh/", ".gnupg", ".gnupg/", ".env", ".env.local", ".env.production",
    "secrets/", "credentials/", "/etc/passwd", "/etc/shadow", "~/.bashrc", "~/.zshrc",
];

const CONTENT_KEYS: &[&str] = &["content", "command", "code", "script", "query", "text", "input"];
const PATH_KEYS: &[&str] = &["path", "file", "filepath", "filename", "directory", "dir", "target"];
const SHELL_TOOLS: &[&str] = &["bash", "shell", "execute"];

struct CompiledPattern {
    regex: Regex,
    label: &'static str,
}

/// Scans tool input for destructive commands and access to sensitive paths.
/// Fires at [`HookType::PreToolUse`].
pub struct PreToolUseHook {
    priority: u32,
    points: Vec<HookType>,
    patterns: Vec<CompiledPattern>,
}

impl PreToolUseHook {
    /// Build the hook with its default pattern set.
    pub fn new() -> Self {
        let patterns = vec![
            (r"rm\s+-rf\s+/(?:\s|$)", "rm -rf / (root wipe)"),
            (r"eval\s*\(", "eval("),
            (r"exec\s*\(", "exec("),
            (r"__import__\s*\(", "__import__("),
            (r"subprocess\.(run|call|Popen)\s*\(", "subprocess.*("),
            (r"os\.system\s*\(", "os.system("),
            (r"(?i)DROP\s+(TABLE|DATABASE)", "DROP TABLE/DATABASE"),
            (r"(?i)DELETE\s+FROM\s+\w+\s*(?:;|$)", "DELETE FROM without WHERE"),
        ]
        .into_iter()
        .map(|(pattern, label)| CompiledPattern {
            regex: Regex::new(pattern).expect("static pattern is valid regex"),
            label,
        })
        .collect();

        Self {
            priority: 50,
            points: vec![HookType::PreToolUse],
            patterns,
        }
    }

    fn extract_strings<'a>(args: &'a serde_json::Value, keys: &[&str]) -> Vec<&'a str> {
        let Some(obj) = args.as_object() else {
            return Vec::new();
        };
        keys.iter()
            .filter_map(|k| obj.get(*k).and_then(|v| v.as_str()))
            .collect()
    }

    fn scan_dangerous_commands(&self, text: &str) -> Option<String> {
        let lower = text.to_lowercase();
        DANGEROUS_COMMANDS
            .iter()
            .find(|cmd| lower.contains(*cmd))
            .map(|cmd| format!("blocked command pattern: {cmd}"))
            .or_else(|| {
                self.patterns
                    .iter()
                    .find(|p| p.regex.is_match(text))
                    .map(|p| format!("blocked command pattern: {}", p.label))
            })
    }

    fn scan_sensitive_paths(text: &str) -> Option<String> {
        SENSITIVE_PATHS
            .iter()
            .find(|path| text.contains(*path))
            .map(|path| format!("blocked access to sensitive path: {path}"))
    }

    fn scan_shell_specific(tool_name: &str, command: &str) -> Option<String> {
        if !SHELL_TOOLS.contains(&tool_name) {
            return None;
        }
        for segment in command.split('|').skip(1) {
            let segment = segment.trim();
            if DANGEROUS_COMMANDS.iter().any(|cmd| segment.to_lowercase().contains(cmd)) {
                return Some(format!("blocked piped command: {segment}"));
            }
        }
        let redirect = Regex::new(r">\s*([^\s]+)").expect("static pattern is valid regex");
        if let Some(caps) = redirect.captures(command) {
            let target = &caps[1];
            if SENSITIVE_PATHS.iter().any(|p| target.contains(p)) {
                return Some(format!("blocked redirect into sensitive path: {target}"));
            }
        }
        None
    }
}

impl Default for PreToolUseHook {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Hook for PreToolUseHook {
    fn points(&self) -> &[HookType] {
        &self.points
    }

    fn priority(&self) -> u32 {
        self.priority
    }

    async fn on_event(&self, ctx: &HookContext) -> Result<HookResult, HookError> {
        let Some(args) = &ctx.tool_args else {
            return Ok(HookResult::allow("no tool arguments to inspect", 0));
        };

        let contents = Self::extract_strings(args, CONTENT_KEYS);
        let paths = Self::extract_strings(args, PATH_KEYS);
        let tool_name = ctx.tool_name.as_deref().unwrap_or("");

        for content in &contents {
            // sudo is downgraded to a warning, never a block: an operator
            // may legitimately need elevated privileges.
            if content.contains("sudo ") {
                tracing::warn!(tool = tool_name, "tool invocation uses sudo");
            }
            if let Some(reason) = self.scan_dangerous_commands(content) {
                return Ok(HookResult::block(reason, 0));
            }
            if let Some(reason) = Self::scan_sensitive_paths(content) {
                return Ok(HookResult::block(reason, 0));
            }
            if let Some(reason) = Self::scan_shell_specific(tool_name, content) {
                return Ok(HookResult::block(reason, 0));
            }
        }

        for path in &paths {
            if let Some(reason) = Self::scan_sensitive_paths(path) {
                return Ok(HookResult::block(reason, 0));
            }
        }

        Ok(HookResult::allow("no dangerous pattern detected", 0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx_with_args(tool_name: &str, args: serde_json::Value) -> HookContext {
        let mut ctx = HookContext::new(HookType::PreToolUse, "s1", "architect", "/work");
        ctx.tool_name = Some(tool_name.to_string());
        ctx.tool_args = Some(args);
        ctx
    }

    #[tokio::test]
    async fn blocks_rm_rf_root() {
        let hook = PreToolUseHook::new();
        let ctx = ctx_with_args("bash", serde_json::json!({"command": "rm -rf /"}));
        let result = hook.on_event(&ctx).await.unwrap();
        assert_eq!(result.action, HookAction::Block);
    }

    #[tokio::test]
    async fn blocks_access_to_ssh_dir() {
        let hook = PreToolUseHook::new();
        let ctx = ctx_with_args("write_file", serde_json::json!({"path": "~/.ssh/id_rsa"}));
        let result = hook.on_event(&ctx).await.unwrap();
        assert_eq!(result.action, HookAction::Block);
    }

    #[tokio::test]
    async fn blocks_piped_destructive_command() {
        let hook = PreToolUseHook::new();
        let ctx = ctx_with_args("bash", serde_json::json!({"command": "echo hi | rm -rf /"}));
        let result = hook.on_event(&ctx).await.unwrap();
        assert_eq!(result.action, HookAction::Block);
    }

    #[tokio::test]
    async fn allows_ordinary_command() {
        let hook = PreToolUseHook::new();
        let ctx = ctx_with_args("bash", serde_json::json!({"command": "ls -la"}));
        let result = hook.on_event(&ctx).await.unwrap();
        assert_eq!(result.action, HookAction::Allow);
    }

    #[tokio::test]
    async fn sudo_is_warned_not_blocked() {
        let hook = PreToolUseHook::new();
        let ctx = ctx_with_args("bash", serde_json::json!({"command": "sudo apt update"}));
        let result = hook.on_event(&ctx).await.unwrap();
        assert_eq!(result.action, HookAction::Allow);
    }
}
