//! [`VectorStore`] contract and its in-memory, keyword-overlap-scored substrate.
//!
//! Entries are [`MemoryEntry`] (council-core's shared memory-fabric shape);
//! this module supplies only the storage and search behavior over it.

use std::collections::HashMap;

use async_trait::async_trait;
use council_core::memory_types::MemoryEntry;
use serde_json::Value;
use tokio::sync::RwLock;

/// Pluggable document store with keyword/vector search.
///
/// `InMemoryVectorStore` is the keyword-overlap substrate used for tests and
/// as a fallback when no real embedding backend is configured; production
/// deployments plug in an ANN-backed implementation behind the same trait.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Store `text`, returning the id it was stored under (an explicit `id`
    /// upserts; otherwise one is derived from the content).
    async fn add(&self, text: &str, metadata: Value, id: Option<String>) -> String;

    /// Search for the `k` entries most relevant to `query`, optionally
    /// restricted to entries whose metadata matches every key/value in `where_`.
    async fn search(&self, query: &str, k: usize, where_: Option<&Value>) -> Vec<MemoryEntry>;

    /// Fetch a single entry by id.
    async fn get(&self, id: &str) -> Option<MemoryEntry>;

    /// Remove an entry by id.
    async fn delete(&self, id: &str);

    /// Number of stored entries.
    async fn count(&self) -> usize;

    /// Remove every entry.
    async fn clear(&self);
}

/// In-memory [`VectorStore`] that scores relevance by keyword overlap
/// (words longer than two characters shared between query and document).
pub struct InMemoryVectorStore {
    docs: RwLock<HashMap<String, MemoryEntry>>,
    insertion_order: RwLock<Vec<String>>,
}

fn matches_where(metadata: &Value, where_: Option<&Value>) -> bool {
    let Some(clauses) = where_.and_then(Value::as_object) else {
        return true;
    };
    let Some(meta) = metadata.as_object() else {
        return clauses.is_empty();
    };
    clauses.iter().all(|(k, v)| meta.get(k) == Some(v))
}

impl InMemoryVectorStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self { docs: RwLock::new(HashMap::new()), insertion_order: RwLock::new(Vec::new()) }
    }

    fn derive_id(text: &str) -> String {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        text.hash(&mut hasher);
        format!("{:012x}", hasher.finish() & 0xFFFF_FFFF_FFFF)
    }

    /// Keyword relevance score in `[0, 1]`: fraction of query words (len > 2)
    /// found in the document, lower-cased.
    fn keyword_score(query: &str, document: &str) -> f64 {
        let query_words: Vec<&str> = query.split_whitespace().filter(|w| w.len() > 2).collect();
        if query_words.is_empty() {
            return 0.0;
        }
        let doc_lower = document.to_lowercase();
        let hits = query_words.iter().filter(|w| doc_lower.contains(&w.to_lowercase())).count();
        hits as f64 / query_words.len() as f64
    }

    /// Hybrid search: fuse vector-style (here, keyword-overlap) and BM25-style
    /// keyword results via reciprocal rank fusion (`K = 60`), weighted by `alpha`
    /// (1.0 = pure vector results, 0.0 = pure keyword results).
    pub async fn hybrid_search(&self, query: &str, k: usize, alpha: f64, where_: Option<&Value>) -> Vec<MemoryEntry> {
        const RRF_K: f64 = 60.0;
        let vector_results = self.search(query, k * 2, where_).await;
        let keyword_results = self.keyword_search(query, k * 2, where_).await;

        let mut scores: HashMap<String, (MemoryEntry, f64)> = HashMap::new();
        for (rank, entry) in vector_results.into_iter().enumerate() {
            let score = alpha / (RRF_K + rank as f64 + 1.0);
            scores.entry(entry.id.clone()).or_insert((entry, 0.0)).1 += score;
        }
        for (rank, entry) in keyword_results.into_iter().enumerate() {
            let score = (1.0 - alpha) / (RRF_K + rank as f64 + 1.0);
            scores.entry(entry.id.clone()).or_insert((entry, 0.0)).1 += score;
        }

        let mut ranked: Vec<(MemoryEntry, f64)> = scores.into_values().collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked.into_iter().take(k).map(|(entry, _)| entry).collect()
    }

    async fn keyword_search(&self, query: &str, k: usize, where_: Option<&Value>) -> Vec<MemoryEntry> {
        let query_words: Vec<String> = query.split_whitespace().map(|w| w.to_lowercase()).collect();
        if query_words.is_empty() {
            return Vec::new();
        }

        let docs = self.docs.read().await;
        let mut results: Vec<MemoryEntry> = docs
            .values()
            .filter(|e| matches_where(&e.metadata, where_))
            .filter_map(|e| {
                let doc_lower = e.text.to_lowercase();
                let word_count = query_words.iter().filter(|w| w.len() > 2 && doc_lower.contains(w.as_str())).count();
                if word_count == 0 {
                    return None;
                }
                let total_words = e.text.split_whitespace().count().max(1);
                let score = word_count as f64 / total_words as f64;
                let mut entry = e.clone();
                entry.distance = Some(1.0 - score);
                Some(entry)
            })
            .collect();

        results.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(k);
        results
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn add(&self, text: &str, metadata: Value, id: Option<String>) -> String {
        let id = id.unwrap_or_else(|| Self::derive_id(text));
        let mut docs = self.docs.write().await;
        if !docs.contains_key(&id) {
            self.insertion_order.write().await.push(id.clone());
        }
        docs.insert(id.clone(), MemoryEntry { id: id.clone(), text: text.to_string(), metadata, distance: None });
        id
    }

    async fn search(&self, query: &str, k: usize, where_: Option<&Value>) -> Vec<MemoryEntry> {
        let order = self.insertion_order.read().await;
        let docs = self.docs.read().await;

        if query.is_empty() {
            return order
                .iter()
                .filter_map(|id| docs.get(id))
                .filter(|e| matches_where(&e.metadata, where_))
                .take(k)
                .cloned()
                .map(|mut e| {
                    e.distance = Some(0.0);
                    e
                })
                .collect();
        }

        let mut scored: Vec<MemoryEntry> = order
            .iter()
            .filter_map(|id| docs.get(id))
            .filter(|e| matches_where(&e.metadata, where_))
            .filter_map(|e| {
                let score = Self::keyword_score(query, &e.text);
                if score <= 0.0 {
                    return None;
                }
                let mut entry = e.clone();
                entry.distance = Some(1.0 - score);
                Some(entry)
            })
            .collect();
        scored.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        scored
    }

    async fn get(&self, id: &str) -> Option<MemoryEntry> {
        self.docs.read().await.get(id).cloned()
    }

    async fn delete(&self, id: &str) {
        self.docs.write().await.remove(id);
        self.insertion_order.write().await.retain(|x| x != id);
    }

    async fn count(&self) -> usize {
        self.docs.read().await.len()
    }

    async fn clear(&self) {
        self.docs.write().await.clear();
        self.insertion_order.write().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn add_and_get_round_trips() {
        let store = InMemoryVectorStore::new();
        let id = store.add("hello world", json!({"tag": "greeting"}), None).await;
        let entry = store.get(&id).await.unwrap();
        assert_eq!(entry.text, "hello world");
        assert_eq!(entry.metadata.get("tag"), Some(&json!("greeting")));
    }

    #[tokio::test]
    async fn search_filters_by_keyword_overlap() {
        let store = InMemoryVectorStore::new();
        store.add("the architecture review is complete", Value::Null, Some("a".into())).await;
        store.add("unrelated grocery list", Value::Null, Some("b".into())).await;

        let results = store.search("architecture review", 5, None).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "a");
    }

    #[tokio::test]
    async fn hybrid_search_fuses_both_rankings() {
        let store = InMemoryVectorStore::new();
        store.add("council governance gateway design", Value::Null, Some("a".into())).await;
        store.add("council governance", Value::Null, Some("b".into())).await;
        store.add("totally unrelated text", Value::Null, Some("c".into())).await;

        let results = store.hybrid_search("council governance gateway", 2, 0.5, None).await;
        assert_eq!(results.len(), 2);
        assert!(results.iter().any(|e| e.id == "a"));
    }

    #[tokio::test]
    async fn where_clause_restricts_results() {
        let store = InMemoryVectorStore::new();
        store.add("doc one", json!({"kind": "note"}), Some("a".into())).await;
        store.add("doc one", json!({"kind": "task"}), Some("b".into())).await;

        let where_ = json!({"kind": "task"});
        let results = store.search("", 5, Some(&where_)).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "b");
    }
}
