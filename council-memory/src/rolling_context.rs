//! [`RollingContext`]: O(1)-growth conversation context via a sliding recent
//! window plus a rolling summary of everything pruned from it.
//!
//! The data shape (`council_core::memory_types::RollingContext`/`RoundEntry`)
//! lives in council-core; this module supplies the `add_turn`/compaction/
//! rendering operations over it.

pub use council_core::memory_types::RoundEntry;
use council_core::memory_types::RollingContext as RollingContextData;

/// A function that compresses concatenated turn text into a summary,
/// e.g. an LLM call. Falls back to [`default_summarize`] when none is supplied.
pub type Summarizer = Box<dyn Fn(&str) -> String + Send + Sync>;

/// Maintains a fixed-size window of recent turns; once the window's
/// estimated token cost crosses `compression_threshold * max_tokens`, the
/// oldest half of the window is folded into a rolling summary.
pub struct RollingContext {
    data: RollingContextData,
    summarizer: Option<Summarizer>,
    round_counter: u64,
}

impl RollingContext {
    /// Create a rolling context with the given token budget (applies to
    /// the recent window only) and compression threshold (fraction of
    /// `max_tokens`, in `(0, 1]`, at which the oldest half is compressed).
    pub fn new(max_tokens: u64, compression_threshold: f64) -> Self {
        Self { data: RollingContextData::new(max_tokens, compression_threshold), summarizer: None, round_counter: 0 }
    }

    /// Rebuild a rolling context from previously persisted data (e.g. read
    /// back from a `StateStore`). The round counter resumes from the
    /// highest `round_number` already present.
    pub fn from_data(data: RollingContextData) -> Self {
        let round_counter = data.recent.iter().map(|r| r.round_number).max().unwrap_or(0);
        Self { data, summarizer: None, round_counter }
    }

    /// Install a custom summarizer, used instead of [`default_summarize`].
    pub fn with_summarizer(mut self, summarizer: Summarizer) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    /// Set the immutable system-prompt-and-task preamble.
    pub fn set_static_context(&mut self, context: impl Into<String>) {
        self.data.static_context = context.into();
    }

    /// Record a new turn, compressing the oldest half of the window if the
    /// token budget is now exceeded.
    pub fn add_turn(&mut self, role: impl Into<String>, content: impl Into<String>) {
        self.round_counter += 1;
        let content = content.into();
        let token_count = (content.len() / 4) as u64;

        self.data.recent.push(RoundEntry { role: role.into(), content, token_count, round_number: self.round_counter });
        if self.data.needs_compaction() {
            self.compress_oldest_turns();
        }
    }

    fn compress_oldest_turns(&mut self) {
        if self.data.recent.len() < 2 {
            return;
        }

        let cut = self.data.recent.len() / 2;
        let to_compress: Vec<RoundEntry> = self.data.recent.drain(..cut).collect();

        let new_summary = match &self.summarizer {
            Some(f) => {
                let joined = to_compress.iter().map(|r| format!("{}: {}", r.role, r.content)).collect::<Vec<_>>().join("\n");
                f(&joined)
            }
            None => default_summarize(&to_compress),
        };

        if self.data.past_summary.is_empty() {
            self.data.past_summary = new_summary;
        } else {
            self.data.past_summary = format!("{}\n\n{}", self.data.past_summary, new_summary);
        }
    }

    /// Render static context, rolling summary, and recent turns into one
    /// prompt-ready string.
    pub fn context_for_prompt(&self, include_summary: bool) -> String {
        let mut parts = Vec::new();

        if !self.data.static_context.is_empty() {
            parts.push(self.data.static_context.clone());
        }
        if include_summary && !self.data.past_summary.is_empty() {
            parts.push("=== PREVIOUSLY ===".to_string());
            parts.push(self.data.past_summary.clone());
        }
        if !self.data.recent.is_empty() {
            parts.push("=== CURRENT ===".to_string());
            for entry in &self.data.recent {
                parts.push(format!("[R{}] {}: {}", entry.round_number, entry.role, entry.content));
            }
        }

        parts.join("\n\n")
    }

    /// Token/round usage statistics.
    pub fn stats(&self) -> RollingContextStats {
        let recent_tokens = self.data.recent_tokens();
        let summary_tokens = (self.data.past_summary.len() / 4) as u64;
        RollingContextStats {
            recent_rounds: self.data.recent.len(),
            recent_tokens,
            summary_tokens,
            total_tokens: recent_tokens + summary_tokens,
            max_tokens: self.data.max_tokens,
            utilization: if self.data.max_tokens > 0 { recent_tokens as f64 / self.data.max_tokens as f64 } else { 0.0 },
        }
    }

    /// Clear the rolling summary and recent history, keeping the static context.
    pub fn reset(&mut self) {
        self.data.past_summary.clear();
        self.data.recent.clear();
        self.round_counter = 0;
    }

    /// Borrow the underlying council-core data shape, e.g. for persistence.
    pub fn data(&self) -> &RollingContextData {
        &self.data
    }
}

fn default_summarize(entries: &[RoundEntry]) -> String {
    let round_range = format!("R{}-R{}", entries[0].round_number, entries[entries.len() - 1].round_number);
    let mut roles: Vec<&str> = entries.iter().map(|e| e.role.as_str()).collect();
    roles.sort_unstable();
    roles.dedup();
    let previews: Vec<String> = entries.iter().take(3).map(|e| e.content.chars().take(50).collect()).collect();
    format!("[{round_range}] participants: {}. summary: {}...", roles.join(", "), previews.join("; "))
}

/// Snapshot returned by [`RollingContext::stats`].
#[derive(Debug, Clone, Copy)]
pub struct RollingContextStats {
    /// Turns still held in the recent window.
    pub recent_rounds: usize,
    /// Estimated tokens in the recent window.
    pub recent_tokens: u64,
    /// Estimated tokens in the rolling summary.
    pub summary_tokens: u64,
    /// Sum of `recent_tokens` and `summary_tokens`.
    pub total_tokens: u64,
    /// The configured token budget.
    pub max_tokens: u64,
    /// `recent_tokens / max_tokens`.
    pub utilization: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compresses_oldest_half_past_threshold() {
        let mut ctx = RollingContext::new(100, 0.5);
        for i in 0..6 {
            ctx.add_turn("Agent", "x".repeat(40) + &i.to_string());
        }
        assert!(!ctx.data.past_summary.is_empty());
        assert!(ctx.data.recent.len() < 6);
    }

    #[test]
    fn prompt_includes_static_context_and_recent_turns() {
        let mut ctx = RollingContext::new(8000, 0.7);
        ctx.set_static_context("you are an architect");
        ctx.add_turn("Architect", "I think we should use a queue");

        let prompt = ctx.context_for_prompt(true);
        assert!(prompt.contains("you are an architect"));
        assert!(prompt.contains("Architect: I think we should use a queue"));
    }

    #[test]
    fn reset_clears_history_but_keeps_static_context() {
        let mut ctx = RollingContext::new(8000, 0.7);
        ctx.set_static_context("static");
        ctx.add_turn("A", "hello");
        ctx.reset();
        assert_eq!(ctx.stats().recent_rounds, 0);
        assert_eq!(ctx.data.static_context, "static");
    }
}
