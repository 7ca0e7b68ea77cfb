#![deny(missing_docs)]
//! The Sandbox protocol (§4.1) — isolated script execution.
//!
//! Shaped as an `Environment` trait (`run(input, spec) -> Output`): a
//! small async seam with no dependency on the rest of the runtime, so any
//! number of isolation strategies can implement it. [`LocalSandbox`] spawns
//! an interpreter in a scratch directory; [`ContainerSandbox`] and
//! [`RemoteSandbox`] are unimplemented seams (§1 names container/remote
//! isolation as an external collaborator) that report `status=error` with a
//! diagnostic rather than silently degrading to local execution.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from constructing or running a sandbox.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum SandboxError {
    /// The scratch directory could not be created or written to.
    #[error("scratch dir error: {0}")]
    ScratchDir(#[from] std::io::Error),
}

/// Outcome bucket for a sandbox run (§4.1).
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// The script ran to completion with exit code 0.
    Success,
    /// The script ran to completion with a nonzero exit code.
    Failure,
    /// The script did not complete within the timeout.
    Timeout,
    /// The sandbox itself could not run the script (missing provider, setup failure).
    Error,
}

/// The opaque result of a sandbox run. Callers treat `stdout`/`stderr` as
/// opaque bytes for the data reducer (§4.2) to process.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxResult {
    /// Outcome bucket.
    pub status: ExecutionStatus,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// Process exit code, or -1 on timeout/error.
    pub returncode: i32,
    /// Which provider produced this result (e.g. `"local"`, `"container"`).
    pub execution_mode: String,
}

impl SandboxResult {
    fn error(execution_mode: impl Into<String>, diagnostic: impl Into<String>) -> Self {
        Self {
            status: ExecutionStatus::Error,
            stdout: String::new(),
            stderr: diagnostic.into(),
            returncode: -1,
            execution_mode: execution_mode.into(),
        }
    }

    fn timeout(execution_mode: impl Into<String>) -> Self {
        Self {
            status: ExecutionStatus::Timeout,
            stdout: String::new(),
            stderr: "execution timed out".to_string(),
            returncode: -1,
            execution_mode: execution_mode.into(),
        }
    }
}

/// An isolated execution environment for a single script (§4.1).
///
/// The sandbox does not retry on failure or timeout — retry is the caller's
/// policy (the PTC executor's, per §4.3).
#[async_trait]
pub trait Sandbox: Send + Sync {
    /// Run `script` under `timeout`, returning the captured result.
    async fn run(&self, script: &str, timeout: Duration) -> SandboxResult;

    /// Identifies this provider in `SandboxResult::execution_mode`.
    fn mode(&self) -> &str;
}

/// Runs a script by spawning an interpreter directly on the host, scoped to
/// a working directory. No resource limits, no network isolation — suitable
/// for development and trusted single-tenant deployments.
pub struct LocalSandbox {
    interpreter: String,
    working_dir: PathBuf,
    env_overrides: Vec<(String, String)>,
}

impl LocalSandbox {
    /// Create a sandbox that spawns `interpreter <script-file>` inside `working_dir`.
    pub fn new(interpreter: impl Into<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            interpreter: interpreter.into(),
            working_dir: working_dir.into(),
            env_overrides: Vec::new(),
        }
    }

    /// Add an environment variable override visible to the spawned process.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_overrides.push((key.into(), value.into()));
        self
    }

    async fn write_script_file(&self, script: &str) -> Result<tempfile::NamedTempFile, SandboxError> {
        use std::io::Write;
        let mut file = tempfile::NamedTempFile::new_in(&self.working_dir)?;
        file.write_all(script.as_bytes())?;
        file.flush()?;
        Ok(file)
    }
}

#[async_trait]
impl Sandbox for LocalSandbox {
    async fn run(&self, script: &str, timeout: Duration) -> SandboxResult {
        let script_file = match self.write_script_file(script).await {
            Ok(f) => f,
            Err(e) => return SandboxResult::error(self.mode(), e.to_string()),
        };

        let mut command = tokio::process::Command::new(&self.interpreter);
        command.arg(script_file.path()).current_dir(&self.working_dir);
        for (key, value) in &self.env_overrides {
            command.env(key, value);
        }

        match tokio::time::timeout(timeout, command.output()).await {
            Ok(Ok(output)) => SandboxResult {
                status: if output.status.success() { ExecutionStatus::Success } else { ExecutionStatus::Failure },
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                returncode: output.status.code().unwrap_or(-1),
                execution_mode: self.mode().to_string(),
            },
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "sandbox process failed to spawn");
                SandboxResult::error(self.mode(), e.to_string())
            }
            Err(_) => SandboxResult::timeout(self.mode()),
        }
    }

    fn mode(&self) -> &str {
        "local"
    }
}

/// Container-isolated execution. Not wired to a real container runtime in
/// this codebase — §1 names container isolation as an external
/// collaborator, so this struct only satisfies the trait seam.
#[derive(Default)]
pub struct ContainerSandbox;

#[async_trait]
impl Sandbox for ContainerSandbox {
    async fn run(&self, _script: &str, _timeout: Duration) -> SandboxResult {
        SandboxResult::error(self.mode(), "container sandbox backend is not configured")
    }

    fn mode(&self) -> &str {
        "container"
    }
}

/// Remote managed-cloud-sandbox execution via an external API. Not wired to
/// a real backend in this codebase, for the same reason as [`ContainerSandbox`].
#[derive(Default)]
pub struct RemoteSandbox;

#[async_trait]
impl Sandbox for RemoteSandbox {
    async fn run(&self, _script: &str, _timeout: Duration) -> SandboxResult {
        SandboxResult::error(self.mode(), "remote sandbox backend is not configured")
    }

    fn mode(&self) -> &str {
        "remote"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn local_sandbox_runs_a_script() {
        let dir = tempfile::tempdir().unwrap();
        let sandbox = LocalSandbox::new("bash", dir.path());
        let result = sandbox.run("echo hello", Duration::from_secs(5)).await;
        assert_eq!(result.status, ExecutionStatus::Success);
        assert!(result.stdout.contains("hello"));
    }

    #[tokio::test]
    async fn local_sandbox_reports_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let sandbox = LocalSandbox::new("bash", dir.path());
        let result = sandbox.run("sleep 5", Duration::from_millis(50)).await;
        assert_eq!(result.status, ExecutionStatus::Timeout);
        assert_eq!(result.returncode, -1);
    }

    #[tokio::test]
    async fn container_sandbox_reports_missing_backend() {
        let sandbox = ContainerSandbox;
        let result = sandbox.run("echo hi", Duration::from_secs(1)).await;
        assert_eq!(result.status, ExecutionStatus::Error);
        assert_eq!(result.execution_mode, "container");
    }
}
