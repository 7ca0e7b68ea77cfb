//! [`MemoryAggregator`]: unified query/remember façade over short-term,
//! long-term, and knowledge-graph memory.

use council_core::memory_types::Tier;
use serde_json::Value;

use crate::knowledge_graph::KnowledgeGraph;
use crate::tiered::TieredMemory;
use crate::vector_store::VectorStore;

/// A single result from [`MemoryAggregator::query`], tagged with its source.
#[derive(Debug, Clone)]
pub struct QueryResult {
    /// Which memory source produced this result.
    pub source: &'static str,
    /// The matched content.
    pub content: String,
    /// Metadata attached to the matched entry.
    pub metadata: Value,
    /// Distance from the query (lower is more relevant).
    pub distance: f64,
}

/// A [`MemoryAggregator::reflect`] health report.
#[derive(Debug, Clone)]
pub struct ReflectionReport {
    /// Count of duplicate entries found in short-term memory.
    pub duplicates_found: usize,
    /// Count of low-importance entries found in short-term memory.
    pub low_importance: usize,
    /// Human-readable suggestions derived from the findings.
    pub suggestions: Vec<String>,
    /// Overall health label: `"good"`, `"needs_attention"`, or `"poor"`.
    pub memory_health: &'static str,
}

const CONSOLIDATION_THRESHOLD: usize = 5;

/// Unifies [`TieredMemory`] and [`KnowledgeGraph`] behind one query/remember API.
pub struct MemoryAggregator {
    /// The tiered vector memory backing short/long-term storage.
    pub tiered: TieredMemory,
    /// The knowledge graph backing entity memory.
    pub knowledge_graph: KnowledgeGraph,
}

impl MemoryAggregator {
    /// Create an aggregator over a fresh [`TieredMemory`] and [`KnowledgeGraph`].
    pub fn new() -> Self {
        Self { tiered: TieredMemory::new(), knowledge_graph: KnowledgeGraph::new() }
    }

    /// Query short-term, long-term, and the knowledge graph (or a subset of
    /// `sources`, any of `"short_term"`, `"long_term"`, `"knowledge_graph"`),
    /// returning up to `2*k` results sorted ascending by distance.
    pub async fn query(&self, text: &str, sources: Option<&[&str]>, k: usize) -> Vec<QueryResult> {
        let sources = sources.unwrap_or(&["short_term", "long_term", "knowledge_graph"]);
        let mut results = Vec::new();

        if sources.contains(&"short_term") {
            for r in self.tiered.short_term.search(text, k, None).await {
                results.push(QueryResult { source: "short_term", content: r.text, metadata: r.metadata, distance: r.distance.unwrap_or(0.0) });
            }
        }
        if sources.contains(&"long_term") {
            for r in self.tiered.long_term.search(text, k, None).await {
                results.push(QueryResult { source: "long_term", content: r.text, metadata: r.metadata, distance: r.distance.unwrap_or(0.0) });
            }
        }
        if sources.contains(&"knowledge_graph") {
            for entity in self.knowledge_graph.search_hybrid(text, k) {
                let metadata = serde_json::to_value(&entity.properties).unwrap_or(Value::Null);
                results.push(QueryResult { source: "knowledge_graph", content: entity.name.clone(), metadata, distance: 0.0 });
            }
        }

        results.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(k * 2);
        results
    }

    /// Store `content` directly under `memory_type`.
    pub async fn remember(&self, content: &str, memory_type: Tier, metadata: Value) -> String {
        match memory_type {
            Tier::Working => self.tiered.working.add(content, metadata, None).await,
            Tier::ShortTerm => self.tiered.short_term.add(content, metadata, None).await,
            Tier::LongTerm => self.tiered.long_term.add(content, metadata, None).await,
        }
    }

    /// Store `content`, automatically choosing working/short-term/long-term
    /// based on a heuristic importance score.
    pub async fn smart_remember(&self, content: &str, context: Option<&str>, metadata: Value) -> String {
        let importance = Self::calculate_importance(content, context);
        let mut metadata = metadata;
        if !metadata.is_object() {
            metadata = serde_json::json!({});
        }
        let obj = metadata.as_object_mut().expect("just ensured object");
        obj.insert("importance_score".to_string(), Value::from(importance));
        obj.insert("auto_classified".to_string(), Value::Bool(true));

        let memory_type = if importance >= 0.7 {
            Tier::LongTerm
        } else if importance >= 0.3 {
            Tier::ShortTerm
        } else {
            Tier::Working
        };

        self.remember(content, memory_type, metadata).await
    }

    fn calculate_importance(content: &str, _context: Option<&str>) -> f64 {
        const KEYWORDS: &[&str] = &[
            "decision", "conclusion", "important", "critical", "must", "key", "architecture",
            "design", "security", "vulnerability", "bug",
        ];

        let mut score = 0.3_f64;

        if content.len() > 500 {
            score += 0.2;
        } else if content.len() > 200 {
            score += 0.1;
        }

        let content_lower = content.to_lowercase();
        let keyword_hits = KEYWORDS.iter().filter(|kw| content_lower.contains(*kw)).count();
        score += (keyword_hits as f64 * 0.1).min(0.3);

        if content.contains("```") || content.contains("fn ") || content.contains("struct ") {
            score += 0.15;
        }
        if content.chars().any(|c| c.is_ascii_digit()) && content.contains('.') {
            score += 0.05;
        }

        score.min(1.0)
    }

    /// Migrate all short-term entries into long-term (if short-term holds at
    /// least the consolidation threshold), tagging `consolidated_from`, then
    /// clear short-term. Returns the count migrated.
    pub async fn consolidate(&self) -> usize {
        let count = self.tiered.short_term.count().await;
        if count < CONSOLIDATION_THRESHOLD {
            return 0;
        }

        let entries = self.tiered.short_term.search("", count, None).await;
        for entry in &entries {
            let mut metadata = entry.metadata.clone();
            if !metadata.is_object() {
                metadata = serde_json::json!({});
            }
            metadata.as_object_mut().expect("just ensured object").insert("consolidated_from".to_string(), Value::String("short_term".to_string()));
            self.tiered.long_term.add(&entry.text, metadata, None).await;
        }
        self.tiered.short_term.clear().await;
        entries.len()
    }

    /// Format up to `max_chars` of the top 5 query results for inclusion in
    /// an LLM prompt.
    pub async fn context_for_llm(&self, query: &str, max_chars: usize) -> String {
        let results = self.query(query, None, 5).await;
        if results.is_empty() {
            return String::new();
        }

        let mut parts = vec!["[relevant memory]".to_string()];
        let mut total_chars = parts[0].len();
        for r in results {
            let entry = format!("- [{}] {}", r.source, r.content);
            if total_chars + entry.len() > max_chars {
                break;
            }
            total_chars += entry.len();
            parts.push(entry);
        }
        parts.join("\n")
    }

    /// Scan short-term memory for duplicate (same first 100 chars,
    /// normalized) and low-importance entries, returning a health report.
    pub async fn reflect(&self) -> ReflectionReport {
        let entries = self.tiered.short_term.search("", 100, None).await;

        if entries.is_empty() {
            return ReflectionReport { duplicates_found: 0, low_importance: 0, suggestions: vec![], memory_health: "good" };
        }

        let mut seen = std::collections::HashSet::new();
        let mut duplicates_found = 0;
        for e in &entries {
            let key = Self::dedup_key(&e.text);
            if !seen.insert(key) {
                duplicates_found += 1;
            }
        }

        let low_importance = entries.iter().filter(|e| Self::calculate_importance(&e.text, None) < 0.3).count();

        let mut suggestions = Vec::new();
        if duplicates_found > 0 {
            suggestions.push(format!("found {duplicates_found} duplicate memories, call deduplicate()"));
        }
        if low_importance as f64 > entries.len() as f64 * 0.5 {
            suggestions.push("over 50% of memories are low-importance, consider tightening the memory policy".to_string());
        }

        let total_issues = duplicates_found + low_importance;
        let memory_health = if total_issues as f64 > entries.len() as f64 * 0.5 {
            "poor"
        } else if total_issues as f64 > entries.len() as f64 * 0.3 {
            "needs_attention"
        } else {
            "good"
        };

        ReflectionReport { duplicates_found, low_importance, suggestions, memory_health }
    }

    /// Remove duplicate short-term entries (first 100 chars, normalized),
    /// keeping the first occurrence. Returns the count removed.
    pub async fn deduplicate(&self) -> usize {
        let count = self.tiered.short_term.count().await;
        if count == 0 {
            return 0;
        }
        let entries = self.tiered.short_term.search("", count, None).await;

        let mut seen = std::collections::HashSet::new();
        let mut removed = 0;
        for e in entries {
            let key = Self::dedup_key(&e.text);
            if !seen.insert(key) {
                self.tiered.short_term.delete(&e.id).await;
                removed += 1;
            }
        }
        removed
    }

    fn dedup_key(document: &str) -> String {
        document.chars().take(100).collect::<String>().to_lowercase().trim().to_string()
    }

    /// `(available, count)` per source.
    pub async fn stats(&self) -> [(&'static str, usize); 3] {
        [
            ("short_term", self.tiered.short_term.count().await),
            ("long_term", self.tiered.long_term.count().await),
            ("knowledge_graph", self.knowledge_graph.len()),
        ]
    }
}

impl Default for MemoryAggregator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn smart_remember_routes_by_importance() {
        let agg = MemoryAggregator::new();
        agg.smart_remember("typo", None, Value::Null).await;
        assert_eq!(agg.tiered.working.count().await, 1);

        let long = "this is a critical architecture decision ".repeat(20);
        agg.smart_remember(&long, None, Value::Null).await;
        assert_eq!(agg.tiered.long_term.count().await, 1);
    }

    #[tokio::test]
    async fn consolidate_requires_threshold() {
        let agg = MemoryAggregator::new();
        for i in 0..4 {
            agg.remember(&format!("note {i}"), Tier::ShortTerm, Value::Null).await;
        }
        assert_eq!(agg.consolidate().await, 0);

        agg.remember("note 5", Tier::ShortTerm, Value::Null).await;
        assert_eq!(agg.consolidate().await, 5);
        assert_eq!(agg.tiered.short_term.count().await, 0);
        assert_eq!(agg.tiered.long_term.count().await, 5);
    }

    #[tokio::test]
    async fn deduplicate_removes_repeats() {
        let agg = MemoryAggregator::new();
        agg.remember("same content here", Tier::ShortTerm, Value::Null).await;
        agg.remember("same content here", Tier::ShortTerm, Value::Null).await;
        agg.remember("different", Tier::ShortTerm, Value::Null).await;

        let removed = agg.deduplicate().await;
        assert_eq!(removed, 1);
        assert_eq!(agg.tiered.short_term.count().await, 2);
    }
}
