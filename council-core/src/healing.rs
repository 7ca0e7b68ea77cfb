//! Self-healing loop data model (§3, §4.11).

use serde::{Deserialize, Serialize};

/// Parsed result of running the configured `test_command`.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    /// Whether every test passed.
    pub passed: bool,
    /// Counts of passed/failed/skipped tests, as parsed from output.
    pub counts: TestCounts,
    /// Names of the tests that failed.
    pub failed_tests: Vec<String>,
    /// How long the run took.
    pub duration_ms: u64,
    /// Raw stderr/stdout the parser couldn't structure further.
    pub error_output: String,
}

/// Pass/fail/skip tally for a [`TestResult`].
#[non_exhaustive]
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TestCounts {
    /// Number of passed tests.
    pub passed: u32,
    /// Number of failed tests.
    pub failed: u32,
    /// Number of skipped tests.
    pub skipped: u32,
}

/// Category of test failure, used to route patch generation.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    /// An assertion failed.
    Assertion,
    /// A module or symbol could not be imported.
    Import,
    /// A type mismatch.
    Type,
    /// Access to a missing attribute/field.
    Attribute,
    /// An undefined name was referenced.
    Name,
    /// An invalid value was supplied.
    Value,
    /// A missing map/dict key.
    Key,
    /// An out-of-range index.
    Index,
    /// A syntax error.
    Syntax,
    /// An indentation error.
    Indentation,
    /// Didn't match any known taxonomy entry.
    Unknown,
}

/// Root-cause analysis of one failing test (§4.11).
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnosis {
    /// Name of the test this diagnosis is for.
    pub failed_test: String,
    /// Classified failure category.
    pub error_type: ErrorType,
    /// Raw error message extracted from test output.
    pub error_message: String,
    /// File believed responsible for the failure, if identified.
    pub suspected_file: Option<String>,
    /// Line within `suspected_file`, if identified.
    pub suspected_line: Option<u32>,
    /// Human-readable explanation of why the test is failing.
    pub root_cause: String,
    /// Natural-language description of the fix to attempt.
    pub suggested_fix: String,
}

/// A candidate fix generated from a [`Diagnosis`].
///
/// Applied only if `confidence >= 0.5` and `original` occurs exactly once
/// in `file` (§4.11 step 3).
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patch {
    /// File the patch targets.
    pub file: String,
    /// Exact text to be replaced.
    pub original: String,
    /// Replacement text.
    pub replacement: String,
    /// Confidence in `[0, 1]` that this patch resolves the diagnosis.
    pub confidence: f64,
}

/// Outcome of a self-healing run (§4.11 step 4).
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealingOutcome {
    /// Tests passed before exhausting `max_iterations`.
    Success,
    /// Failure count decreased but did not reach zero.
    Partial,
    /// `max_iterations` was reached without improvement.
    MaxIterations,
}

/// Final report of a self-healing run.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealingReport {
    /// How the run ended.
    pub outcome: HealingOutcome,
    /// Iterations actually used.
    pub iterations_used: u32,
    /// Patches applied, in application order.
    pub patches_applied: Vec<Patch>,
    /// Whether a human should be looped in regardless of `outcome`.
    pub requires_human: bool,
    /// Final test result.
    pub final_result: TestResult,
}
