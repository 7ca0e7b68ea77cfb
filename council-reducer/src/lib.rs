#![deny(missing_docs)]
//! Data Reducer (§4.2): PII redaction, smart compression, and anomaly
//! extraction over sandboxed-script output.
//!
//! Reimplements the original's `DataReducer` in Rust idiom (precompiled
//! `regex::Regex` table rather than a Python list comprehension, `enum`
//! instead of a string `Enum`), keeping the exact algorithm: redact → combine
//! streams → pass through if short → keep head/tail/keyword-middle lines →
//! hard-truncate fallback → append a stats footer.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

const DEFAULT_MAX_CHARS: usize = 2000;
const HEAD_LINES: usize = 20;
const TAIL_LINES: usize = 10;
const COMPRESS_KEYWORDS: &[&str] = &["error", "warning", "failed", "success", "result", "total", "count"];

struct PiiPattern {
    regex: Regex,
    replacement: &'static str,
}

static PII_PATTERNS: LazyLock<Vec<PiiPattern>> = LazyLock::new(|| {
    [
        (r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b", "[EMAIL]"),
        (r"\b\d{3}[-.]?\d{3}[-.]?\d{4}\b", "[PHONE]"),
        (r"\b\d{3}-\d{2}-\d{4}\b", "[SSN]"),
        (r"\b(?:4[0-9]{12}(?:[0-9]{3})?|5[1-5][0-9]{14})\b", "[CREDIT_CARD]"),
        (r"\b\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}\b", "[IP_ADDRESS]"),
        (r"(?i)password\s*[=:]\s*\S+", "[PASSWORD_REDACTED]"),
        (r"(?i)api[_-]?key\s*[=:]\s*\S+", "[API_KEY_REDACTED]"),
        (r"(?i)secret\s*[=:]\s*\S+", "[SECRET_REDACTED]"),
        (r"(?i)token\s*[=:]\s*\S+", "[TOKEN_REDACTED]"),
    ]
    .into_iter()
    .map(|(pattern, replacement)| PiiPattern { regex: Regex::new(pattern).expect("static pattern is valid"), replacement })
    .collect()
});

/// Category of a detected anomaly, carrying its own severity weight.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyType {
    /// A reported error or failure.
    Error,
    /// A reported warning.
    Warning,
    /// A reported critical-severity condition.
    Critical,
    /// A reported timeout or latency issue.
    Performance,
    /// A reported unauthorized-access or denial condition.
    Security,
}

impl AnomalyType {
    fn severity(self) -> u8 {
        match self {
            AnomalyType::Critical => 10,
            AnomalyType::Security => 9,
            AnomalyType::Error => 7,
            AnomalyType::Performance => 5,
            AnomalyType::Warning => 4,
        }
    }
}

static ANOMALY_PATTERNS: LazyLock<Vec<(Regex, AnomalyType)>> = LazyLock::new(|| {
    [
        (r"(?i)\berror\b", AnomalyType::Error),
        (r"(?i)\bwarning\b", AnomalyType::Warning),
        (r"(?i)\bcritical\b", AnomalyType::Critical),
        (r"(?i)\bfailed\b", AnomalyType::Error),
        (r"(?i)\bexception\b", AnomalyType::Error),
        (r"(?i)\btimeout\b", AnomalyType::Performance),
        (r"(?i)\bunauthorized\b", AnomalyType::Security),
        (r"(?i)\bdenied\b", AnomalyType::Security),
    ]
    .into_iter()
    .map(|(p, t)| (Regex::new(p).expect("static pattern is valid"), t))
    .collect()
});

/// A single detected anomaly, with enough context to act on without
/// re-reading the full output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Anomaly {
    /// Which category matched.
    pub r#type: AnomalyType,
    /// The matching line, truncated to 200 chars.
    pub description: String,
    /// 1-indexed line number.
    pub line_number: usize,
    /// Up to 2 lines of surrounding context, truncated to 500 chars.
    pub context: String,
    /// 1-10, higher is worse.
    pub severity: u8,
}

/// Line-count/char-count/error-warning tallies over a block of text.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Statistics {
    /// Total line count.
    pub total_lines: usize,
    /// Total character count.
    pub total_chars: usize,
    /// Lines matching `error` (case-insensitive).
    pub error_count: usize,
    /// Lines matching `warning` (case-insensitive).
    pub warning_count: usize,
}

/// Redacts PII and compresses sandbox output into a bounded-size summary (§4.2).
pub struct DataReducer {
    max_chars: usize,
    filter_pii: bool,
    extract_stats: bool,
}

impl DataReducer {
    /// Create a reducer with the given char budget.
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars, filter_pii: true, extract_stats: true }
    }

    /// Disable PII redaction (on by default).
    pub fn without_pii_filter(mut self) -> Self {
        self.filter_pii = false;
        self
    }

    /// Disable the trailing statistics footer (on by default).
    pub fn without_stats(mut self) -> Self {
        self.extract_stats = false;
        self
    }

    /// Redact, combine, and compress `stdout`/`stderr` into a summary no
    /// longer than this reducer's char budget (barring the hard-truncate
    /// marker itself).
    pub fn reduce(&self, stdout: &str, stderr: &str) -> String {
        let (stdout, stderr) = if self.filter_pii {
            (self.filter_pii_text(stdout), self.filter_pii_text(stderr))
        } else {
            (stdout.to_string(), stderr.to_string())
        };

        let combined = Self::combine_output(&stdout, &stderr);
        if combined.chars().count() <= self.max_chars {
            return combined;
        }

        self.smart_compress(&combined)
    }

    /// Scan `data` for anomaly keywords, deduped by `(type, first 50 chars)`
    /// and returned sorted by descending severity, capped at 20.
    pub fn extract_anomalies(&self, data: &str) -> Vec<Anomaly> {
        let lines: Vec<&str> = data.split('\n').collect();
        let mut anomalies = Vec::new();

        for (idx, line) in lines.iter().enumerate() {
            for (regex, anomaly_type) in ANOMALY_PATTERNS.iter() {
                if regex.is_match(line) {
                    let line_number = idx + 1;
                    let start = idx.saturating_sub(2);
                    let end = (idx + 3).min(lines.len());
                    let context: String = lines[start..end].join("\n").chars().take(500).collect();

                    anomalies.push(Anomaly {
                        r#type: *anomaly_type,
                        description: line.trim().chars().take(200).collect(),
                        line_number,
                        context,
                        severity: anomaly_type.severity(),
                    });
                }
            }
        }

        let mut seen = std::collections::HashSet::new();
        let mut unique = Vec::new();
        for anomaly in anomalies {
            let key = (anomaly.r#type, anomaly.description.chars().take(50).collect::<String>());
            if seen.insert(key) {
                unique.push(anomaly);
            }
        }

        unique.sort_by(|a, b| b.severity.cmp(&a.severity));
        unique.truncate(20);
        unique
    }

    /// Compute basic line/char/error/warning tallies over `data`.
    pub fn extract_statistics(&self, data: &str) -> Statistics {
        let lines: Vec<&str> = data.split('\n').collect();
        let error_re = Regex::new(r"(?i)\berror\b").expect("static pattern is valid");
        let warning_re = Regex::new(r"(?i)\bwarning\b").expect("static pattern is valid");

        Statistics {
            total_lines: lines.len(),
            total_chars: data.chars().count(),
            error_count: lines.iter().filter(|l| error_re.is_match(l)).count(),
            warning_count: lines.iter().filter(|l| warning_re.is_match(l)).count(),
        }
    }

    fn filter_pii_text(&self, text: &str) -> String {
        let mut out = text.to_string();
        for pattern in PII_PATTERNS.iter() {
            out = pattern.regex.replace_all(&out, pattern.replacement).into_owned();
        }
        out
    }

    fn combine_output(stdout: &str, stderr: &str) -> String {
        if !stdout.trim().is_empty() && stderr.trim().is_empty() {
            return stdout.trim().to_string();
        }

        let mut parts = Vec::new();
        if !stdout.trim().is_empty() {
            parts.push(format!("=== STDOUT ===\n{}", stdout.trim()));
        }
        if !stderr.trim().is_empty() {
            parts.push(format!("=== STDERR ===\n{}", stderr.trim()));
        }

        if parts.is_empty() {
            "(no output)".to_string()
        } else {
            parts.join("\n\n")
        }
    }

    fn smart_compress(&self, text: &str) -> String {
        let lines: Vec<&str> = text.split('\n').collect();
        let mut important = Vec::new();

        important.extend(lines.iter().take(HEAD_LINES).copied());

        if lines.len() > HEAD_LINES + TAIL_LINES {
            for line in &lines[HEAD_LINES..lines.len() - TAIL_LINES] {
                if COMPRESS_KEYWORDS.iter().any(|kw| line.to_lowercase().contains(kw)) {
                    important.push(line);
                }
            }
        }

        important.extend(lines.iter().rev().take(TAIL_LINES).rev().copied());

        let mut summary = important.join("\n");
        if summary.chars().count() > self.max_chars {
            let truncated: String = summary.chars().take(self.max_chars.saturating_sub(100)).collect();
            summary = format!("{truncated}\n\n... [truncated, original {} chars]", text.chars().count());
        }

        if self.extract_stats {
            let stats = self.extract_statistics(text);
            let stats_line = format!(
                "\nstats: {} lines, {} errors, {} warnings",
                stats.total_lines, stats.error_count, stats.warning_count
            );
            if summary.chars().count() + stats_line.chars().count() <= self.max_chars {
                summary.push_str(&stats_line);
            }
        }

        summary
    }
}

impl Default for DataReducer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CHARS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_output_passes_through_unchanged() {
        let reducer = DataReducer::new(2000);
        let result = reducer.reduce("all good", "");
        assert_eq!(result, "all good");
    }

    #[test]
    fn redacts_email_and_api_key() {
        let reducer = DataReducer::new(2000);
        let result = reducer.reduce("contact me at a@b.com, api_key=sk-12345", "");
        assert!(result.contains("[EMAIL]"));
        assert!(result.contains("[API_KEY_REDACTED]"));
    }

    #[test]
    fn long_output_keeps_head_tail_and_keyword_middle() {
        let reducer = DataReducer::new(200);
        let mut lines: Vec<String> = (0..50).map(|i| format!("line {i}")).collect();
        lines[30] = "ERROR: something broke".to_string();
        let body = lines.join("\n");

        let result = reducer.reduce(&body, "");
        assert!(result.contains("line 0"));
        assert!(result.contains("line 49"));
        assert!(result.contains("ERROR: something broke"));
    }

    #[test]
    fn extract_anomalies_dedupes_and_sorts_by_severity() {
        let reducer = DataReducer::new(2000);
        let data = "INFO starting\nERROR disk full\nERROR disk full\nCRITICAL meltdown";
        let anomalies = reducer.extract_anomalies(data);
        assert_eq!(anomalies[0].r#type, AnomalyType::Critical);
        assert_eq!(anomalies.iter().filter(|a| a.r#type == AnomalyType::Error).count(), 1);
    }
}
