//! [`SemanticCache`]: exact-hash cache backed by a [`VectorStore`] for
//! similarity-based fallback lookups.

use std::sync::atomic::{AtomicU64, Ordering};

use council_core::memory_types::CacheEntry;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;

use crate::vector_store::VectorStore;

fn query_hash(query: &str) -> String {
    let digest = Sha256::digest(query.as_bytes());
    digest.iter().take(8).map(|b| format!("{b:02x}")).collect()
}

/// Caches LLM responses keyed by exact query hash, with an optional
/// [`VectorStore`]-backed semantic fallback for near-duplicate queries.
///
/// TTLs and ages are tracked as millisecond timestamps (matching
/// `council_core::memory_types::CacheEntry`), passed in explicitly rather
/// than read from the system clock.
pub struct SemanticCache<S: VectorStore> {
    vector_store: Option<S>,
    similarity_threshold: f64,
    ttl_seconds: u64,
    max_entries: usize,
    exact_cache: RwLock<std::collections::HashMap<String, CacheEntry>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<S: VectorStore> SemanticCache<S> {
    /// Create a cache with the given similarity threshold (`[0, 1]`), TTL,
    /// and max entry count. `vector_store` is optional; without it only
    /// exact-hash lookups succeed.
    pub fn new(vector_store: Option<S>, similarity_threshold: f64, ttl_hours: u64, max_entries: usize) -> Self {
        Self {
            vector_store,
            similarity_threshold,
            ttl_seconds: ttl_hours * 3600,
            max_entries,
            exact_cache: RwLock::new(std::collections::HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Look up a cached response for `query`: first by exact hash, then (if
    /// a vector store is attached) by semantic similarity above the
    /// configured threshold.
    pub async fn get(&self, query: &str, now_ms: u64) -> Option<serde_json::Value> {
        let hash = query_hash(query);
        {
            let mut cache = self.exact_cache.write().await;
            if let Some(entry) = cache.get_mut(&hash) {
                if !entry.is_expired(now_ms) {
                    entry.hits += 1;
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Some(entry.response.clone());
                }
                cache.remove(&hash);
            }
        }

        if let Some(store) = &self.vector_store {
            let results = store.search(query, 1, None).await;
            if let Some(result) = results.into_iter().next() {
                let similarity = 1.0 - result.distance.unwrap_or(1.0);
                if similarity >= self.similarity_threshold {
                    if let Some(cached) = result.metadata.get("cached_response") {
                        self.hits.fetch_add(1, Ordering::Relaxed);
                        return Some(cached.clone());
                    }
                }
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Cache `response` for `query`, in both the exact-hash map and (if
    /// attached) the vector store.
    pub async fn set(&self, query: &str, response: serde_json::Value, now_ms: u64) {
        self.cleanup_expired(now_ms).await;

        let hash = query_hash(query);
        let entry = CacheEntry {
            query: query.to_string(),
            response: response.clone(),
            query_hash: hash.clone(),
            created_at: now_ms,
            hits: 0,
            metadata: serde_json::Value::Null,
            ttl: self.ttl_seconds,
        };
        self.exact_cache.write().await.insert(hash, entry);

        if let Some(store) = &self.vector_store {
            let metadata = serde_json::json!({"cached_response": response, "type": "semantic_cache"});
            store.add(query, metadata, None).await;
        }
    }

    async fn cleanup_expired(&self, now_ms: u64) {
        let mut cache = self.exact_cache.write().await;
        cache.retain(|_, entry| !entry.is_expired(now_ms));

        if cache.len() > self.max_entries {
            let mut by_age: Vec<(String, u64)> = cache.iter().map(|(k, v)| (k.clone(), v.created_at)).collect();
            by_age.sort_by_key(|(_, created_at)| *created_at);
            let to_remove = cache.len() - self.max_entries;
            for (key, _) in by_age.into_iter().take(to_remove) {
                cache.remove(&key);
            }
        }
    }

    /// Invalidate the exact-hash entry for `query`. Returns whether an
    /// entry was present.
    pub async fn invalidate(&self, query: &str) -> bool {
        self.exact_cache.write().await.remove(&query_hash(query)).is_some()
    }

    /// Remove every exact-hash entry, and clear the vector store if attached.
    /// Returns the count of exact entries removed.
    pub async fn clear(&self) -> usize {
        let mut cache = self.exact_cache.write().await;
        let count = cache.len();
        cache.clear();
        if let Some(store) = &self.vector_store {
            store.clear().await;
        }
        count
    }

    /// Hit/miss statistics.
    pub async fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        CacheStats {
            total_entries: self.exact_cache.read().await.len(),
            hits,
            misses,
            hit_rate: if total > 0 { hits as f64 / total as f64 } else { 0.0 },
            has_vector_cache: self.vector_store.is_some(),
        }
    }
}

/// Snapshot returned by [`SemanticCache::stats`].
#[derive(Debug, Clone, Copy)]
pub struct CacheStats {
    /// Entries currently in the exact-hash map.
    pub total_entries: usize,
    /// Cumulative hit count.
    pub hits: u64,
    /// Cumulative miss count.
    pub misses: u64,
    /// `hits / (hits + misses)`, 0.0 if no lookups yet.
    pub hit_rate: f64,
    /// Whether a vector store fallback is attached.
    pub has_vector_cache: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector_store::InMemoryVectorStore;
    use serde_json::json;

    #[tokio::test]
    async fn exact_hit_returns_cached_response() {
        let cache: SemanticCache<InMemoryVectorStore> = SemanticCache::new(None, 0.85, 24, 1000);
        cache.set("what is rust", json!("a systems language"), 0).await;

        assert_eq!(cache.get("what is rust", 1_000).await, Some(json!("a systems language")));
        assert_eq!(cache.stats().await.hits, 1);
    }

    #[tokio::test]
    async fn miss_is_counted() {
        let cache: SemanticCache<InMemoryVectorStore> = SemanticCache::new(None, 0.85, 24, 1000);
        assert_eq!(cache.get("anything", 0).await, None);
        assert_eq!(cache.stats().await.misses, 1);
    }

    #[tokio::test]
    async fn entry_expires_after_ttl() {
        let cache: SemanticCache<InMemoryVectorStore> = SemanticCache::new(None, 0.85, 0, 1000);
        cache.set("q", json!("r"), 0).await;
        assert_eq!(cache.get("q", 10_000).await, None);
    }

    #[tokio::test]
    async fn max_entries_evicts_oldest() {
        let cache: SemanticCache<InMemoryVectorStore> = SemanticCache::new(None, 0.85, 24, 2);
        cache.set("a", json!("1"), 0).await;
        cache.set("b", json!("2"), 1).await;
        cache.set("c", json!("3"), 2).await;

        assert_eq!(cache.stats().await.total_entries, 2);
        assert_eq!(cache.get("a", 2).await, None);
    }

    #[tokio::test]
    async fn invalidate_removes_entry() {
        let cache: SemanticCache<InMemoryVectorStore> = SemanticCache::new(None, 0.85, 24, 1000);
        cache.set("q", json!("r"), 0).await;
        assert!(cache.invalidate("q").await);
        assert_eq!(cache.get("q", 0).await, None);
    }
}
