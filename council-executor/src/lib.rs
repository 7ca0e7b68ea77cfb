#![deny(missing_docs)]
//! Multi-Model Executor (C12, §4.12): dispatches prompts to possibly-distinct
//! models/roles concurrently, bounded by a semaphore, with per-task timeout,
//! bounded retry, and fallback-model substitution. No exception a
//! [`ModelProvider`] raises propagates out of [`MultiModelExecutor::execute_parallel`] —
//! it becomes a failed [`ModelResult`] entry instead.
//!
//! Ported from the original `MultiModelExecutor`'s `execute_parallel`/
//! `execute_pipeline`/fallback-table shape; `asyncio.Semaphore` becomes
//! `tokio::sync::Semaphore`, `asyncio.wait_for` becomes `tokio::time::timeout`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use council_core::error::ProviderError;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, Semaphore};

/// The role a [`ModelTask`] plays in a pipeline.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelRole {
    /// Task decomposition and planning.
    Planner,
    /// Fast generation work.
    Executor,
    /// Review and validation of another model's output.
    Reviewer,
    /// Complex problem solving, reserved for the hardest tasks.
    Expert,
    /// No specific role.
    General,
}

/// A unit of work to be sent to one model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelTask {
    /// Model identifier (e.g. `"claude-sonnet"`).
    pub model: String,
    /// The prompt to send.
    pub prompt: String,
    /// The role this model plays in the pipeline.
    pub role: ModelRole,
    /// Maximum execution time for this task.
    pub timeout: Duration,
    /// Additional context for the task.
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl ModelTask {
    /// Create a task with the given model, prompt, and role, using the
    /// executor's `default_timeout` (set via [`MultiModelExecutor::execute_parallel`]
    /// only if `timeout` is left at [`Duration::ZERO`]).
    pub fn new(model: impl Into<String>, prompt: impl Into<String>, role: ModelRole) -> Self {
        Self { model: model.into(), prompt: prompt.into(), role, timeout: Duration::ZERO, metadata: serde_json::Value::Null }
    }

    /// Override the per-task timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Result of running one [`ModelTask`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelResult {
    /// Model that produced (or failed to produce) this result.
    pub model: String,
    /// Role of the model that ran.
    pub role: ModelRole,
    /// The model's output. Empty on failure.
    pub output: String,
    /// Wall-clock execution time, in milliseconds.
    pub latency_ms: u64,
    /// Whether execution succeeded.
    pub success: bool,
    /// Error message, set only when `success` is false.
    pub error: Option<String>,
    /// Token consumption, if the provider reported it.
    #[serde(default)]
    pub token_usage: HashMap<String, u64>,
}

impl ModelResult {
    /// Whether this result is non-empty and usable by downstream stages.
    pub fn is_valid(&self) -> bool {
        self.success && !self.output.trim().is_empty()
    }
}

/// Running tally of [`MultiModelExecutor::execute_parallel`] calls.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ExecutionStats {
    /// Total tasks executed.
    pub total_tasks: u64,
    /// Tasks that succeeded.
    pub successful: u64,
    /// Tasks that failed.
    pub failed: u64,
    /// Sum of `latency_ms` across every task.
    pub total_latency_ms: u64,
    /// Sum of all reported token usage.
    pub total_tokens: u64,
}

impl ExecutionStats {
    /// `successful / total_tasks`, or `0.0` if nothing has run yet.
    pub fn success_rate(&self) -> f64 {
        if self.total_tasks == 0 {
            0.0
        } else {
            self.successful as f64 / self.total_tasks as f64
        }
    }

    /// `total_latency_ms / total_tasks`, or `0.0` if nothing has run yet.
    pub fn avg_latency_ms(&self) -> f64 {
        if self.total_tasks == 0 {
            0.0
        } else {
            self.total_latency_ms as f64 / self.total_tasks as f64
        }
    }
}

/// A model backend callable by the executor. Concrete providers (Anthropic,
/// OpenAI, …) are out of scope (§1); only [`MockProvider`] ships here.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Send `prompt` to `model` and return its text completion.
    async fn complete(&self, model: &str, prompt: &str) -> Result<String, ProviderError>;
}

/// Result of [`MultiModelExecutor::execute_pipeline`].
#[derive(Debug, Clone)]
pub struct PipelineResult {
    /// Result of the planning stage.
    pub planner: ModelResult,
    /// Results of the (parallel) execution stage. Empty if planning failed.
    pub executors: Vec<ModelResult>,
    /// Result of the review stage, if a reviewer task was supplied and planning succeeded.
    pub reviewer: Option<ModelResult>,
}

const DEFAULT_FALLBACKS: &[(&str, &str)] =
    &[("claude-opus", "claude-sonnet"), ("claude-sonnet", "claude-haiku"), ("gpt-5", "gpt-5-mini")];

/// Dispatches [`ModelTask`]s to a [`ModelProvider`], bounded by a semaphore,
/// with per-task timeout, bounded retry, and fallback-model substitution.
pub struct MultiModelExecutor {
    provider: Arc<dyn ModelProvider>,
    semaphore: Arc<Semaphore>,
    default_timeout: Duration,
    retry_count: u32,
    fallback_models: HashMap<String, String>,
    stats: Mutex<ExecutionStats>,
}

impl MultiModelExecutor {
    /// Create an executor with `max_concurrent` (default 5), `default_timeout`
    /// (default 30s), and `retry_count` (default 1) retries per task before
    /// giving up.
    pub fn new(provider: Arc<dyn ModelProvider>) -> Self {
        Self {
            provider,
            semaphore: Arc::new(Semaphore::new(5)),
            default_timeout: Duration::from_secs(30),
            retry_count: 1,
            fallback_models: DEFAULT_FALLBACKS.iter().map(|(a, b)| (a.to_string(), b.to_string())).collect(),
            stats: Mutex::new(ExecutionStats::default()),
        }
    }

    /// Override the concurrency bound.
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.semaphore = Arc::new(Semaphore::new(max_concurrent.max(1)));
        self
    }

    /// Override the default per-task timeout (used when a [`ModelTask`]
    /// leaves `timeout` at zero).
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Override the retry count.
    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    /// Register (or replace) a fallback model, tried on retries after the
    /// primary model times out or errors.
    pub fn with_fallback(mut self, primary: impl Into<String>, fallback: impl Into<String>) -> Self {
        self.fallback_models.insert(primary.into(), fallback.into());
        self
    }

    /// Execute every task concurrently, bounded by the configured semaphore.
    /// No task's failure affects another's — exceptions and timeouts become
    /// failed [`ModelResult`] entries, never propagate as `Err`.
    pub async fn execute_parallel(&self, tasks: Vec<ModelTask>) -> Vec<ModelResult> {
        if tasks.is_empty() {
            return vec![];
        }
        tracing::info!(count = tasks.len(), "executing model tasks in parallel");

        let futures = tasks.into_iter().map(|task| self.execute_single(task));
        let results: Vec<ModelResult> = futures_util::future::join_all(futures).await;

        self.update_stats(&results).await;
        results
    }

    async fn execute_single(&self, task: ModelTask) -> ModelResult {
        let _permit = self.semaphore.acquire().await.expect("semaphore is never closed");
        let start = std::time::Instant::now();
        let timeout = if task.timeout.is_zero() { self.default_timeout } else { task.timeout };

        let mut current_model = task.model.clone();
        let mut attempt = 0u32;
        loop {
            let call = self.provider.complete(&current_model, &task.prompt);
            match tokio::time::timeout(timeout, call).await {
                Ok(Ok(output)) => {
                    return ModelResult {
                        model: current_model,
                        role: task.role,
                        output,
                        latency_ms: start.elapsed().as_millis() as u64,
                        success: true,
                        error: None,
                        token_usage: HashMap::new(),
                    };
                }
                Ok(Err(err)) => {
                    if attempt < self.retry_count {
                        if let Some(fallback) = self.fallback_models.get(&current_model) {
                            tracing::info!(from = %current_model, to = %fallback, "falling back after provider error");
                            current_model = fallback.clone();
                        }
                        attempt += 1;
                        continue;
                    }
                    return ModelResult {
                        model: current_model,
                        role: task.role,
                        output: String::new(),
                        latency_ms: start.elapsed().as_millis() as u64,
                        success: false,
                        error: Some(err.to_string()),
                        token_usage: HashMap::new(),
                    };
                }
                Err(_elapsed) => {
                    tracing::warn!(model = %current_model, attempt, "model task timed out");
                    if attempt < self.retry_count {
                        if let Some(fallback) = self.fallback_models.get(&current_model) {
                            tracing::info!(from = %current_model, to = %fallback, "falling back after timeout");
                            current_model = fallback.clone();
                        }
                        attempt += 1;
                        continue;
                    }
                    return ModelResult {
                        model: current_model,
                        role: task.role,
                        output: String::new(),
                        latency_ms: start.elapsed().as_millis() as u64,
                        success: false,
                        error: Some("timeout".to_string()),
                        token_usage: HashMap::new(),
                    };
                }
            }
        }
    }

    async fn update_stats(&self, results: &[ModelResult]) {
        let mut stats = self.stats.lock().await;
        for result in results {
            stats.total_tasks += 1;
            if result.success {
                stats.successful += 1;
            } else {
                stats.failed += 1;
            }
            stats.total_latency_ms += result.latency_ms;
            stats.total_tokens += result.token_usage.values().sum::<u64>();
        }
    }

    /// Run a standard planner → (parallel) executors → optional reviewer
    /// pipeline. Short-circuits after the planning stage if it fails: the
    /// `executors`/`reviewer` stages never run.
    pub async fn execute_pipeline(
        &self,
        planner_task: ModelTask,
        executor_tasks: Vec<ModelTask>,
        reviewer_task: Option<ModelTask>,
    ) -> PipelineResult {
        tracing::info!("pipeline: planning stage");
        let mut planner_results = self.execute_parallel(vec![planner_task]).await;
        let planner = planner_results.remove(0);

        if !planner.success {
            tracing::error!("pipeline: planning failed, aborting");
            return PipelineResult { planner, executors: vec![], reviewer: None };
        }

        tracing::info!(count = executor_tasks.len(), "pipeline: execution stage");
        let executors = self.execute_parallel(executor_tasks).await;

        let reviewer = match reviewer_task {
            Some(task) => {
                tracing::info!("pipeline: review stage");
                let mut results = self.execute_parallel(vec![task]).await;
                Some(results.remove(0))
            }
            None => None,
        };

        PipelineResult { planner, executors, reviewer }
    }

    /// Snapshot of cumulative execution statistics.
    pub async fn stats(&self) -> ExecutionStats {
        *self.stats.lock().await
    }

    /// Reset cumulative execution statistics to zero.
    pub async fn reset_stats(&self) {
        *self.stats.lock().await = ExecutionStats::default();
    }
}

/// A deterministic [`ModelProvider`] test double — echoes the prompt, with
/// optional scripted failures/latency for exercising retry and timeout paths.
pub struct MockProvider {
    responses: Mutex<HashMap<String, Result<String, String>>>,
    default_response: String,
}

impl MockProvider {
    /// Create a provider that echoes `"{model}: {prompt}"` unless overridden.
    pub fn new() -> Self {
        Self { responses: Mutex::new(HashMap::new()), default_response: String::new() }
    }

    /// Script a specific model to always return `output`.
    pub async fn set_response(&self, model: impl Into<String>, output: impl Into<String>) {
        self.responses.lock().await.insert(model.into(), Ok(output.into()));
    }

    /// Script a specific model to always fail with `message`.
    pub async fn set_failure(&self, model: impl Into<String>, message: impl Into<String>) {
        self.responses.lock().await.insert(model.into(), Err(message.into()));
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModelProvider for MockProvider {
    async fn complete(&self, model: &str, prompt: &str) -> Result<String, ProviderError> {
        let responses = self.responses.lock().await;
        match responses.get(model) {
            Some(Ok(output)) => Ok(output.clone()),
            Some(Err(message)) => Err(ProviderError::Upstream(message.clone())),
            None => {
                if self.default_response.is_empty() {
                    Ok(format!("{model}: {prompt}"))
                } else {
                    Ok(self.default_response.clone())
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn execute_parallel_on_empty_list_returns_empty() {
        let executor = MultiModelExecutor::new(Arc::new(MockProvider::new()));
        assert!(executor.execute_parallel(vec![]).await.is_empty());
    }

    #[tokio::test]
    async fn successful_tasks_populate_output_and_stats() {
        let executor = MultiModelExecutor::new(Arc::new(MockProvider::new()));
        let results = executor
            .execute_parallel(vec![ModelTask::new("claude-sonnet", "hello", ModelRole::Planner)])
            .await;

        assert_eq!(results.len(), 1);
        assert!(results[0].success);
        assert_eq!(results[0].output, "claude-sonnet: hello");

        let stats = executor.stats().await;
        assert_eq!(stats.total_tasks, 1);
        assert_eq!(stats.successful, 1);
    }

    #[tokio::test]
    async fn failures_never_propagate_as_errors() {
        let provider = Arc::new(MockProvider::new());
        provider.set_failure("bad-model", "boom").await;
        let executor = MultiModelExecutor::new(provider).with_retry_count(0);

        let results = executor.execute_parallel(vec![ModelTask::new("bad-model", "x", ModelRole::General)]).await;
        assert_eq!(results.len(), 1);
        assert!(!results[0].success);
        assert_eq!(results[0].error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn retry_falls_back_to_registered_model() {
        let provider = Arc::new(MockProvider::new());
        provider.set_failure("claude-opus", "rate limited").await;
        provider.set_response("claude-sonnet", "fallback worked").await;

        let executor = MultiModelExecutor::new(provider).with_retry_count(1);
        let results = executor.execute_parallel(vec![ModelTask::new("claude-opus", "x", ModelRole::Expert)]).await;

        assert!(results[0].success);
        assert_eq!(results[0].model, "claude-sonnet");
        assert_eq!(results[0].output, "fallback worked");
    }

    #[tokio::test]
    async fn pipeline_short_circuits_when_planner_fails() {
        let provider = Arc::new(MockProvider::new());
        provider.set_failure("planner-model", "down").await;
        let executor = MultiModelExecutor::new(provider).with_retry_count(0);

        let result = executor
            .execute_pipeline(
                ModelTask::new("planner-model", "plan", ModelRole::Planner),
                vec![ModelTask::new("exec-model", "do it", ModelRole::Executor)],
                None,
            )
            .await;

        assert!(!result.planner.success);
        assert!(result.executors.is_empty());
        assert!(result.reviewer.is_none());
    }

    #[tokio::test]
    async fn pipeline_runs_all_stages_on_success() {
        let executor = MultiModelExecutor::new(Arc::new(MockProvider::new()));
        let result = executor
            .execute_pipeline(
                ModelTask::new("planner-model", "plan", ModelRole::Planner),
                vec![ModelTask::new("exec-model", "do it", ModelRole::Executor)],
                Some(ModelTask::new("reviewer-model", "review", ModelRole::Reviewer)),
            )
            .await;

        assert!(result.planner.success);
        assert_eq!(result.executors.len(), 1);
        assert!(result.reviewer.unwrap().success);
    }
}
