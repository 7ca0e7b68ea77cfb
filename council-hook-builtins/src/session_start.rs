//! SessionStartHook (§4.6, priority 10): restore state, load env, run init.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use council_core::error::HookError;
use council_core::hook::{Hook, HookAction, HookContext, HookResult, HookType};

const PROTECTED_VARS: [&str; 4] = ["PATH", "HOME", "USER", "SHELL"];

/// Restores session state, loads `.env`, and runs an optional init script.
/// Never blocks — failures are reported as `allow` with `error` set.
pub struct SessionStartHook {
    working_dir: PathBuf,
    state_file: PathBuf,
    init_script: PathBuf,
    env_file: PathBuf,
    priority: u32,
    points: Vec<HookType>,
}

impl SessionStartHook {
    /// Create a hook rooted at `working_dir`, using the default
    /// relative file names (`.council/session_state.json`, `init.sh`, `.env`).
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        let working_dir = working_dir.into();
        Self {
            state_file: working_dir.join(".council/session_state.json"),
            init_script: working_dir.join("init.sh"),
            env_file: working_dir.join(".env"),
            working_dir,
            priority: 10,
            points: vec![HookType::SessionStart],
        }
    }

    async fn restore_state(&self) -> Option<serde_json::Value> {
        let content = tokio::fs::read_to_string(&self.state_file).await.ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Load `.env`, skipping protected system variables. Returns the count
    /// of variables loaded.
    async fn load_env_vars(&self) -> std::io::Result<u32> {
        let content = match tokio::fs::read_to_string(&self.env_file).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };

        let mut count = 0;
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            let value = value.trim().trim_matches('"').trim_matches('\'');
            if !PROTECTED_VARS.contains(&key.to_uppercase().as_str()) {
                std::env::set_var(key, value);
                count += 1;
            }
        }
        Ok(count)
    }

    async fn run_init_script(&self) -> serde_json::Value {
        let run = tokio::process::Command::new("bash")
            .arg(&self.init_script)
            .current_dir(&self.working_dir)
            .output();

        match tokio::time::timeout(Duration::from_secs(60), run).await {
            Ok(Ok(output)) => serde_json::json!({
                "success": output.status.success(),
                "returncode": output.status.code(),
                "stdout": tail(&String::from_utf8_lossy(&output.stdout), 500),
                "stderr": tail(&String::from_utf8_lossy(&output.stderr), 500),
            }),
            Ok(Err(e)) => serde_json::json!({"success": false, "error": e.to_string()}),
            Err(_) => serde_json::json!({"success": false, "error": "script timed out after 60s"}),
        }
    }

    fn venv_active() -> bool {
        std::env::var("VIRTUAL_ENV").is_ok()
    }
}

fn tail(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        s.chars().skip(s.chars().count() - max_chars).collect()
    }
}

#[async_trait]
impl Hook for SessionStartHook {
    fn points(&self) -> &[HookType] {
        &self.points
    }

    fn priority(&self) -> u32 {
        self.priority
    }

    async fn on_event(&self, ctx: &HookContext) -> Result<HookResult, HookError> {
        let mut metadata = HashMap::new();
        let restored = self.restore_state().await;
        metadata.insert("restored_state".to_string(), serde_json::json!(restored.is_some()));

        match self.load_env_vars().await {
            Ok(count) => {
                metadata.insert("env_loaded".to_string(), serde_json::json!(count));
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to load .env");
                metadata.insert("env_load_error".to_string(), serde_json::json!(e.to_string()));
            }
        }

        if tokio::fs::try_exists(&self.init_script).await.unwrap_or(false) {
            metadata.insert("init_script_result".to_string(), self.run_init_script().await);
        } else {
            metadata.insert("init_script_skipped".to_string(), serde_json::json!(true));
        }

        metadata.insert("venv_active".to_string(), serde_json::json!(Self::venv_active()));

        let mut result = HookResult::allow("session initialized", 0);
        result.metadata = serde_json::json!(metadata);
        tracing::info!(session_id = %ctx.session_id, "session initialized");
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn protected_vars_are_never_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join(".env"), "PATH=/evil\nMY_VAR=hello\n")
            .await
            .unwrap();
        let hook = SessionStartHook::new(dir.path());
        let before_path = std::env::var("PATH").unwrap();
        hook.load_env_vars().await.unwrap();
        assert_eq!(std::env::var("PATH").unwrap(), before_path);
        assert_eq!(std::env::var("MY_VAR").unwrap(), "hello");
    }

    #[tokio::test]
    async fn missing_init_script_is_skipped_not_failed() {
        let dir = tempfile::tempdir().unwrap();
        let hook = SessionStartHook::new(dir.path());
        let ctx = HookContext::new(HookType::SessionStart, "s1", "architect", dir.path().to_str().unwrap());
        let result = hook.on_event(&ctx).await.unwrap();
        assert_eq!(result.action, HookAction::Allow);
        assert_eq!(result.metadata["init_script_skipped"], serde_json::json!(true));
    }
}
