#![deny(missing_docs)]
//! Tool interface, execution registry, and scored search index (§4.4).
//!
//! [`ToolDyn`]/[`ToolRegistry`] are an object-safe tool abstraction for
//! execution. [`ToolIndex`] sits on top: it wraps
//! `council_core::tool_meta::ToolDefinition` with the §4.4 "one
//! preloaded search tool, 3-5 tools dynamically loaded" model — a scored
//! `search`, a token-budgeted `search_and_load`, and `unload`.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use council_core::tool_meta::ToolDefinition;
use thiserror::Error;

/// Errors from tool operations.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ToolError {
    /// The requested tool was not found in the registry.
    #[error("tool not found: {0}")]
    NotFound(String),

    /// Tool execution failed.
    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    /// The input provided to the tool was invalid.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Catch-all for other errors.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Object-safe trait for tool implementations.
///
/// Any tool source (local function, MCP server, subprocess) implements
/// this trait. Tools are stored as `Arc<dyn ToolDyn>` in [`ToolRegistry`].
pub trait ToolDyn: Send + Sync {
    /// The tool's unique name.
    fn name(&self) -> &str;

    /// Human-readable description of what the tool does.
    fn description(&self) -> &str;

    /// JSON Schema for the tool's input parameters.
    fn input_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given input.
    fn call(
        &self,
        input: serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = Result<serde_json::Value, ToolError>> + Send + '_>>;
}

/// Registry of executable tools, keyed by name.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn ToolDyn>>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self { tools: HashMap::new() }
    }

    /// Register a tool. Overwrites any existing tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn ToolDyn>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn ToolDyn>> {
        self.tools.get(name)
    }

    /// Iterate over all registered tools.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn ToolDyn>> {
        self.tools.values()
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

const MATCH_THRESHOLD: f64 = 0.1;

/// Relevance score of a [`ToolDefinition`] against a natural-language query (§4.4).
///
/// Exact name match scores 1.0; keyword hits score `min(0.8, 0.3 * hits)`;
/// otherwise falls back to string similarity between the query and the
/// description, scaled down to 0.5 so it never outranks a keyword match.
fn match_score(def: &ToolDefinition, query: &str) -> f64 {
    let query_lower = query.to_lowercase();

    if query_lower.contains(&def.name.to_lowercase()) {
        return 1.0;
    }

    let keyword_hits = def
        .keywords
        .iter()
        .filter(|kw| query_lower.contains(&kw.to_lowercase()))
        .count();
    if keyword_hits > 0 {
        return (0.3 * keyword_hits as f64).min(0.8);
    }

    strsim::jaro(&query_lower, &def.description.to_lowercase()) * 0.5
}

/// Index of tool definitions with scored search and token-budgeted lazy loading.
///
/// This is the "one preloaded tool" of §4.4: an agent starts a session with
/// only this index's own (small) schema in context, then calls
/// [`ToolIndex::search_and_load`] to pull in the 3-5 tools a task actually needs.
pub struct ToolIndex {
    definitions: HashMap<String, ToolDefinition>,
    loaded: HashSet<String>,
    max_loaded_tokens: u32,
}

impl ToolIndex {
    /// Create an index with the given token budget for simultaneously loaded tools.
    pub fn new(max_loaded_tokens: u32) -> Self {
        Self {
            definitions: HashMap::new(),
            loaded: HashSet::new(),
            max_loaded_tokens,
        }
    }

    /// Register a tool definition into the index (does not load it).
    pub fn register(&mut self, def: ToolDefinition) {
        self.definitions.insert(def.name.clone(), def);
    }

    /// Whether `name` is currently loaded.
    pub fn is_loaded(&self, name: &str) -> bool {
        self.loaded.contains(name)
    }

    /// Total token cost of currently loaded tools.
    pub fn loaded_token_cost(&self) -> u32 {
        self.loaded
            .iter()
            .filter_map(|name| self.definitions.get(name))
            .map(|d| d.token_cost)
            .sum()
    }

    /// Search the index, ranked by [`match_score`] descending, filtering out
    /// scores at or below the match threshold.
    pub fn search(&self, query: &str, top_k: usize, include_loaded: bool) -> Vec<&ToolDefinition> {
        let mut candidates: Vec<(f64, &ToolDefinition)> = self
            .definitions
            .values()
            .filter(|d| include_loaded || !self.loaded.contains(&d.name))
            .map(|d| (match_score(d, query), d))
            .filter(|(score, _)| *score > MATCH_THRESHOLD)
            .collect();

        candidates.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        candidates.into_iter().take(top_k).map(|(_, d)| d).collect()
    }

    /// Search and load matches up to `top_k`, stopping before any load would
    /// exceed `max_loaded_tokens`. Returns the names actually loaded.
    pub fn search_and_load(&mut self, query: &str, top_k: usize) -> Vec<String> {
        let candidates: Vec<String> = self
            .search(query, top_k, false)
            .into_iter()
            .map(|d| d.name.clone())
            .collect();

        let mut loaded = Vec::new();
        for name in candidates {
            let cost = self.definitions.get(&name).map(|d| d.token_cost).unwrap_or(0);
            if self.loaded_token_cost() + cost > self.max_loaded_tokens {
                tracing::debug!(tool = %name, "skipping load, would exceed token budget");
                break;
            }
            self.loaded.insert(name.clone());
            loaded.push(name);
        }
        loaded
    }

    /// Unload a tool, freeing its budget. Returns whether it was loaded.
    pub fn unload(&mut self, name: &str) -> bool {
        self.loaded.remove(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn def(name: &str, keywords: &[&str], token_cost: u32) -> ToolDefinition {
        let mut d = ToolDefinition::new(name, format!("a tool named {name}"), "test", json!({}), token_cost);
        d.keywords = keywords.iter().map(|s| s.to_string()).collect();
        d
    }

    #[test]
    fn exact_name_match_scores_highest() {
        let d = def("read_file", &["read", "file"], 80);
        assert_eq!(match_score(&d, "please read_file now"), 1.0);
    }

    #[test]
    fn keyword_match_scales_with_hit_count() {
        let d = def("read_file", &["read", "file"], 80);
        let score = match_score(&d, "can you read the file for me");
        assert!((0.5..=0.8).contains(&score));
    }

    #[test]
    fn search_and_load_stops_at_budget() {
        let mut index = ToolIndex::new(150);
        index.register(def("read_file", &["read"], 80));
        index.register(def("write_file", &["write"], 80));

        let loaded = index.search_and_load("read write", 5);
        assert_eq!(loaded.len(), 1);
        assert!(index.loaded_token_cost() <= 150);
    }

    #[test]
    fn unload_frees_budget() {
        let mut index = ToolIndex::new(100);
        index.register(def("read_file", &["read"], 80));
        index.search_and_load("read", 5);
        assert!(index.is_loaded("read_file"));
        assert!(index.unload("read_file"));
        assert_eq!(index.loaded_token_cost(), 0);
    }
}
