#![deny(missing_docs)]
//! Self-healing loop (C11, §4.11): perceive → reason → act → observe.
//!
//! [`SelfHealingLoop::run`] drives the cycle ported from the original
//! `SelfHealingLoop.run`: run the configured test command, and while it
//! fails, diagnose the first failing test, generate a patch, apply it only
//! if its confidence clears the `0.5` gate, and retest — up to
//! `max_iterations` times. If the loop gives up, every applied patch is
//! rolled back in reverse order so a failed healing attempt never leaves
//! the tree worse than it found it.
//!
//! Test execution goes through `council-sandbox`'s [`council_sandbox::Sandbox`]
//! trait (a one-line shell script handed to `sh`), so the loop inherits
//! whatever isolation strategy the caller configures rather than shelling
//! out directly.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use council_core::healing::{Diagnosis, ErrorType, HealingOutcome, HealingReport, Patch, TestCounts, TestResult};
use council_sandbox::{ExecutionStatus, Sandbox};
use regex::Regex;
use thiserror::Error;

/// Errors raised while driving a healing run.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HealingLoopError {
    /// Reading or writing a patched file failed.
    #[error("file io error on {path}: {source}")]
    Io {
        /// Path that failed.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// Generates a candidate [`Patch`] for a [`Diagnosis`].
///
/// Real patch generation is an LLM call, out of scope here (§1 names model
/// providers as an external collaborator) — [`NullPatchGenerator`] always
/// returns a zero-confidence patch, matching the original's behavior when
/// no LLM credentials are configured. Production callers supply their own
/// implementation backed by `council-executor`.
#[async_trait]
pub trait PatchGenerator: Send + Sync {
    /// Produce a patch attempt for the given diagnosis.
    async fn generate_patch(&self, diagnosis: &Diagnosis) -> Patch;
}

/// A [`PatchGenerator`] that never proposes a real fix.
pub struct NullPatchGenerator;

#[async_trait]
impl PatchGenerator for NullPatchGenerator {
    async fn generate_patch(&self, diagnosis: &Diagnosis) -> Patch {
        Patch {
            file: diagnosis.suspected_file.clone().unwrap_or_default(),
            original: String::new(),
            replacement: String::new(),
            confidence: 0.0,
        }
    }
}

/// Minimum confidence a patch needs before [`SelfHealingLoop::apply_patch`]
/// will touch the filesystem (§4.11 step 3).
pub const CONFIDENCE_THRESHOLD: f64 = 0.5;

/// Confidence below which the loop gives up early rather than spending
/// remaining iterations on a generator that keeps returning nothing usable.
const ABANDON_THRESHOLD: f64 = 0.3;

/// Drives the run-tests → diagnose → patch → retest cycle.
pub struct SelfHealingLoop {
    test_command: String,
    max_iterations: u32,
    working_dir: std::path::PathBuf,
    sandbox: Arc<dyn Sandbox>,
    patch_generator: Arc<dyn PatchGenerator>,
    test_timeout: Duration,
    patches_applied: Vec<Patch>,
}

impl SelfHealingLoop {
    /// Build a loop that runs `test_command` (e.g. `"cargo test"`) inside
    /// `working_dir` via `sandbox`, generating patches with `patch_generator`.
    pub fn new(
        test_command: impl Into<String>,
        working_dir: impl Into<std::path::PathBuf>,
        sandbox: Arc<dyn Sandbox>,
        patch_generator: Arc<dyn PatchGenerator>,
    ) -> Self {
        Self {
            test_command: test_command.into(),
            max_iterations: 5,
            working_dir: working_dir.into(),
            sandbox,
            patch_generator,
            test_timeout: Duration::from_secs(300),
            patches_applied: Vec::new(),
        }
    }

    /// Override the default 5-iteration cap.
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Override the default 5-minute test timeout.
    pub fn with_test_timeout(mut self, timeout: Duration) -> Self {
        self.test_timeout = timeout;
        self
    }

    /// Run the configured test command and parse its output.
    pub async fn run_tests(&self) -> TestResult {
        let start = std::time::Instant::now();
        let result = self.sandbox.run(&self.test_command, self.test_timeout).await;
        let duration_ms = start.elapsed().as_millis() as u64;
        let output = format!("{}\n{}", result.stdout, result.stderr);

        match result.status {
            ExecutionStatus::Timeout => TestResult {
                passed: false,
                counts: TestCounts::default(),
                failed_tests: vec![],
                duration_ms,
                error_output: "test execution timed out".to_string(),
            },
            ExecutionStatus::Error => TestResult {
                passed: false,
                counts: TestCounts::default(),
                failed_tests: vec![],
                duration_ms,
                error_output: output,
            },
            status => {
                let (counts, failed_tests) = parse_test_output(&output);
                TestResult {
                    passed: status == ExecutionStatus::Success,
                    counts,
                    failed_tests,
                    duration_ms,
                    error_output: output,
                }
            }
        }
    }

    /// Classify a failure and identify a likely root cause (§4.11 step 2).
    pub fn diagnose(&self, test_result: &TestResult) -> Diagnosis {
        let error_type = detect_error_type(&test_result.error_output);
        let (suspected_file, suspected_line) = extract_location(&test_result.error_output);
        let failed_test = test_result.failed_tests.first().cloned().unwrap_or_else(|| "unknown".to_string());
        let error_message = extract_error_message(&test_result.error_output);

        Diagnosis {
            failed_test,
            error_type,
            error_message,
            root_cause: root_cause_for(error_type),
            suggested_fix: suggested_fix_for(error_type),
            suspected_file,
            suspected_line,
        }
    }

    /// Apply `patch` to its target file if confidence clears
    /// [`CONFIDENCE_THRESHOLD`] and `original` is present in the file.
    /// Returns whether the patch was actually written.
    pub async fn apply_patch(&mut self, patch: Patch) -> Result<bool, HealingLoopError> {
        if patch.file.is_empty() || patch.confidence < CONFIDENCE_THRESHOLD {
            return Ok(false);
        }

        let current = match tokio::fs::read_to_string(&patch.file).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(HealingLoopError::Io { path: patch.file.clone(), source: e }),
        };

        if !current.contains(&patch.original) {
            return Ok(false);
        }

        let new_content = current.replacen(&patch.original, &patch.replacement, 1);
        tokio::fs::write(&patch.file, new_content)
            .await
            .map_err(|e| HealingLoopError::Io { path: patch.file.clone(), source: e })?;

        self.patches_applied.push(patch);
        Ok(true)
    }

    /// Undo every applied patch, most recent first. Returns how many were
    /// rolled back. Best-effort: a patch whose target file has since
    /// changed (the `replacement` text is no longer present) is skipped
    /// rather than failing the whole rollback.
    pub async fn rollback_patches(&mut self) -> u32 {
        let mut rolled_back = 0;
        for patch in self.patches_applied.drain(..).rev().collect::<Vec<_>>() {
            let Ok(current) = tokio::fs::read_to_string(&patch.file).await else { continue };
            if !current.contains(&patch.replacement) {
                continue;
            }
            let restored = current.replacen(&patch.replacement, &patch.original, 1);
            if tokio::fs::write(&patch.file, restored).await.is_ok() {
                rolled_back += 1;
            }
        }
        rolled_back
    }

    /// Execute the full healing cycle.
    pub async fn run(&mut self) -> Result<HealingReport, HealingLoopError> {
        let initial_result = self.run_tests().await;
        let initial_failures = initial_result.counts.failed;

        if initial_result.passed {
            return Ok(HealingReport {
                outcome: HealingOutcome::Success,
                iterations_used: 0,
                patches_applied: vec![],
                requires_human: false,
                final_result: initial_result,
            });
        }

        let mut test_result = initial_result;
        let mut iterations_used = 0;

        for iteration in 1..=self.max_iterations {
            iterations_used = iteration;
            if iteration > 1 {
                test_result = self.run_tests().await;
            }
            if test_result.passed {
                return Ok(HealingReport {
                    outcome: HealingOutcome::Success,
                    iterations_used: iteration - 1,
                    patches_applied: std::mem::take(&mut self.patches_applied),
                    requires_human: false,
                    final_result: test_result,
                });
            }

            let diagnosis = self.diagnose(&test_result);
            let patch = self.patch_generator.generate_patch(&diagnosis).await;
            let confidence = patch.confidence;
            let applied = self.apply_patch(patch).await?;

            if !applied && confidence < ABANDON_THRESHOLD {
                break;
            }
        }

        let final_result = self.run_tests().await;
        self.rollback_patches().await;

        let outcome = if final_result.counts.failed < initial_failures { HealingOutcome::Partial } else { HealingOutcome::MaxIterations };

        Ok(HealingReport {
            outcome,
            iterations_used,
            patches_applied: vec![],
            requires_human: true,
            final_result,
        })
    }
}

/// Parse pytest/cargo-test-style summary lines for pass/fail counts and
/// failing test names. Heuristic, ported from the original's line scan.
fn parse_test_output(output: &str) -> (TestCounts, Vec<String>) {
    let mut counts = TestCounts::default();
    let mut failed_tests = Vec::new();

    for line in output.lines() {
        let lower = line.to_lowercase();
        if lower.contains("passed") && line.contains('=') {
            let parts: Vec<&str> = line.split_whitespace().collect();
            for (i, part) in parts.iter().enumerate() {
                if *part == "passed" || part.trim_end_matches(';') == "passed," {
                    if let Some(prev) = i.checked_sub(1).and_then(|j| parts.get(j)) {
                        if let Ok(n) = prev.parse::<u32>() {
                            counts.passed = n;
                        }
                    }
                } else if part.starts_with("passed") {
                    if let Ok(n) = parts.get(i.wrapping_sub(1)).map(|s| s.trim_end_matches(';')).unwrap_or("").parse::<u32>() {
                        counts.passed = n;
                    }
                } else if part.trim_end_matches(';').trim_end_matches(',') == "failed" {
                    if let Some(prev) = i.checked_sub(1).and_then(|j| parts.get(j)) {
                        if let Ok(n) = prev.parse::<u32>() {
                            counts.failed = n;
                        }
                    }
                }
            }
        } else if line.contains("FAILED") {
            if let Some(idx) = line.find("FAILED") {
                let rest = line[idx + "FAILED".len()..].trim();
                if !rest.is_empty() {
                    failed_tests.push(rest.to_string());
                }
            }
        }
    }

    (counts, failed_tests)
}

/// Error-type lookup table, ported from `PatchGenerator._detect_error_type`.
const ERROR_PATTERNS: &[(&str, ErrorType)] = &[
    ("AssertionError", ErrorType::Assertion),
    ("ImportError", ErrorType::Import),
    ("ModuleNotFoundError", ErrorType::Import),
    ("TypeError", ErrorType::Type),
    ("AttributeError", ErrorType::Attribute),
    ("NameError", ErrorType::Name),
    ("ValueError", ErrorType::Value),
    ("KeyError", ErrorType::Key),
    ("IndexError", ErrorType::Index),
    ("SyntaxError", ErrorType::Syntax),
    ("IndentationError", ErrorType::Indentation),
];

fn detect_error_type(output: &str) -> ErrorType {
    for (needle, error_type) in ERROR_PATTERNS {
        if output.contains(needle) {
            return *error_type;
        }
    }
    ErrorType::Unknown
}

fn root_cause_for(error_type: ErrorType) -> String {
    match error_type {
        ErrorType::Assertion => "test assertion failed — expected value doesn't match actual",
        ErrorType::Import => "module import failed — missing dependency or wrong path",
        ErrorType::Type => "type mismatch — wrong argument or return type",
        ErrorType::Attribute => "missing attribute — object doesn't have expected property",
        ErrorType::Name => "undefined name — variable or function not defined",
        ErrorType::Value => "invalid value — argument has wrong value",
        ErrorType::Key => "missing key — map key not found",
        ErrorType::Index => "index out of range — collection access beyond bounds",
        ErrorType::Syntax => "syntax error — invalid source syntax",
        ErrorType::Indentation => "indentation error — whitespace doesn't match block structure",
        ErrorType::Unknown => "unrecognized failure — manual triage required",
    }
    .to_string()
}

fn suggested_fix_for(error_type: ErrorType) -> String {
    match error_type {
        ErrorType::Assertion => "check expected vs actual values and update the test or implementation",
        ErrorType::Import => "check the module path and ensure the dependency is declared",
        ErrorType::Type => "verify argument types match the function signature",
        ErrorType::Attribute => "check the object has the expected field or method",
        ErrorType::Name => "define the variable or import the required name",
        ErrorType::Value => "validate input values before use",
        ErrorType::Key => "check the key exists before indexing, or use a default",
        ErrorType::Index => "check the collection length before indexing",
        ErrorType::Syntax => "fix syntax according to the language grammar",
        ErrorType::Indentation => "fix indentation to match the surrounding block",
        ErrorType::Unknown => "review the error message and stack trace",
    }
    .to_string()
}

fn extract_error_message(output: &str) -> String {
    let patterns = [r"AssertionError:\s*(.+)", r"Error:\s*(.+)", r"Exception:\s*(.+)"];
    for pattern in &patterns {
        if let Ok(re) = Regex::new(pattern) {
            if let Some(caps) = re.captures(output) {
                if let Some(m) = caps.get(1) {
                    return truncate(m.as_str(), 500);
                }
            }
        }
    }
    truncate_end(output, 500)
}

fn extract_location(output: &str) -> (Option<String>, Option<u32>) {
    if let Ok(re) = Regex::new(r#"File "([^"]+)", line (\d+)"#) {
        if let Some(caps) = re.captures(output) {
            let file = caps.get(1).map(|m| m.as_str().to_string());
            let line = caps.get(2).and_then(|m| m.as_str().parse().ok());
            if file.is_some() {
                return (file, line);
            }
        }
    }
    if let Ok(re) = Regex::new(r"([\w./\\-]+\.(?:rs|py)):(\d+)") {
        if let Some(caps) = re.captures(output) {
            let file = caps.get(1).map(|m| m.as_str().to_string());
            let line = caps.get(2).and_then(|m| m.as_str().parse().ok());
            if file.is_some() {
                return (file, line);
            }
        }
    }
    (None, None)
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

fn truncate_end(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let start = s.len() - max;
        s[start..].to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;

    struct ScriptedSandbox {
        outputs: std::sync::Mutex<Vec<(ExecutionStatus, &'static str)>>,
    }

    #[async_trait]
    impl Sandbox for ScriptedSandbox {
        async fn run(&self, _script: &str, _timeout: StdDuration) -> council_sandbox::SandboxResult {
            let mut outputs = self.outputs.lock().unwrap();
            let (status, output) = if outputs.len() > 1 { outputs.remove(0) } else { outputs[0].clone() };
            council_sandbox::SandboxResult {
                status,
                stdout: output.to_string(),
                stderr: String::new(),
                returncode: if status == ExecutionStatus::Success { 0 } else { 1 },
                execution_mode: "scripted".to_string(),
            }
        }

        fn mode(&self) -> &str {
            "scripted"
        }
    }

    struct FixedConfidencePatch {
        patch: std::sync::Mutex<Option<Patch>>,
    }

    #[async_trait]
    impl PatchGenerator for FixedConfidencePatch {
        async fn generate_patch(&self, _diagnosis: &Diagnosis) -> Patch {
            self.patch.lock().unwrap().take().unwrap_or(Patch {
                file: String::new(),
                original: String::new(),
                replacement: String::new(),
                confidence: 0.0,
            })
        }
    }

    #[tokio::test]
    async fn passing_tests_short_circuit_to_success() {
        let sandbox = Arc::new(ScriptedSandbox {
            outputs: std::sync::Mutex::new(vec![(ExecutionStatus::Success, "3 passed in 0.1s")]),
        });
        let generator = Arc::new(NullPatchGenerator);
        let mut healer = SelfHealingLoop::new("cargo test", ".", sandbox, generator);

        let report = healer.run().await.unwrap();
        assert_eq!(report.outcome, HealingOutcome::Success);
        assert_eq!(report.iterations_used, 0);
    }

    #[tokio::test]
    async fn low_confidence_patch_is_never_applied() {
        let dir = tempfile::tempdir().unwrap();
        let sandbox = Arc::new(ScriptedSandbox {
            outputs: std::sync::Mutex::new(vec![(ExecutionStatus::Failure, "AssertionError: nope\nFAILED test_foo")]),
        });
        let generator = Arc::new(FixedConfidencePatch {
            patch: std::sync::Mutex::new(Some(Patch {
                file: "x.rs".into(),
                original: "a".into(),
                replacement: "b".into(),
                confidence: 0.1,
            })),
        });
        let mut healer = SelfHealingLoop::new("cargo test", dir.path(), sandbox, generator).with_max_iterations(3);

        let report = healer.run().await.unwrap();
        assert_eq!(report.outcome, HealingOutcome::MaxIterations);
        assert!(report.requires_human);
        assert!(report.patches_applied.is_empty());
    }

    #[tokio::test]
    async fn confident_patch_is_applied_and_rolled_back_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("x.rs");
        tokio::fs::write(&file_path, "let x = broken;").await.unwrap();

        let sandbox = Arc::new(ScriptedSandbox {
            outputs: std::sync::Mutex::new(vec![(ExecutionStatus::Failure, "NameError: broken\nFAILED test_x")]),
        });
        let generator = Arc::new(FixedConfidencePatch {
            patch: std::sync::Mutex::new(Some(Patch {
                file: file_path.to_string_lossy().to_string(),
                original: "broken".into(),
                replacement: "fixed".into(),
                confidence: 0.9,
            })),
        });
        let mut healer = SelfHealingLoop::new("cargo test", dir.path(), sandbox, generator).with_max_iterations(1);

        let report = healer.run().await.unwrap();
        assert_eq!(report.outcome, HealingOutcome::MaxIterations);

        let contents = tokio::fs::read_to_string(&file_path).await.unwrap();
        assert_eq!(contents, "let x = broken;", "rollback should restore the original text");
    }

    #[test]
    fn detects_known_error_types() {
        assert_eq!(detect_error_type("AssertionError: boom"), ErrorType::Assertion);
        assert_eq!(detect_error_type("raise KeyError('x')"), ErrorType::Key);
        assert_eq!(detect_error_type("totally fine"), ErrorType::Unknown);
    }

    #[test]
    fn extracts_python_style_location() {
        let output = "File \"src/main.rs\", line 42, in foo\nAssertionError";
        let (file, line) = extract_location(output);
        assert_eq!(file.as_deref(), Some("src/main.rs"));
        assert_eq!(line, Some(42));
    }
}
