//! [`TieredMemory`]: working / short-term / long-term [`VectorStore`]s with
//! access-count promotion and decay.

pub use council_core::memory_types::Tier;
use serde_json::Value;

use crate::vector_store::{InMemoryVectorStore, VectorStore};

/// Three-tier memory with automatic promotion of frequently-accessed
/// short-term entries into long-term, and decay of stale access counts.
pub struct TieredMemory {
    /// Transient working memory.
    pub working: InMemoryVectorStore,
    /// Session-scoped short-term memory.
    pub short_term: InMemoryVectorStore,
    /// Durable long-term memory.
    pub long_term: InMemoryVectorStore,
    auto_promote_access_count: u64,
    decay_factor: f64,
}

impl TieredMemory {
    /// Create a tiered memory with the default promotion threshold (3) and
    /// decay factor (0.9).
    pub fn new() -> Self {
        Self {
            working: InMemoryVectorStore::new(),
            short_term: InMemoryVectorStore::new(),
            long_term: InMemoryVectorStore::new(),
            auto_promote_access_count: 3,
            decay_factor: 0.9,
        }
    }

    fn store(&self, tier: Tier) -> &InMemoryVectorStore {
        match tier {
            Tier::Working => &self.working,
            Tier::ShortTerm => &self.short_term,
            Tier::LongTerm => &self.long_term,
        }
    }

    fn access_count(metadata: &Value) -> u64 {
        metadata.get("access_count").and_then(Value::as_u64).unwrap_or(0)
    }

    fn set_field(metadata: &mut Value, key: &str, value: Value) {
        if !metadata.is_object() {
            *metadata = serde_json::json!({});
        }
        metadata.as_object_mut().expect("just ensured object").insert(key.to_string(), value);
    }

    /// Move `id` from `from_tier` to `to_tier`, tagging `promoted_from`.
    /// No-op if `id` is not present in `from_tier`.
    pub async fn promote(&self, from_tier: Tier, to_tier: Tier, id: &str) {
        let source = self.store(from_tier);
        let Some(entry) = source.get(id).await else {
            return;
        };

        let mut metadata = entry.metadata;
        Self::set_field(&mut metadata, "promoted_from", Value::String(format!("{from_tier:?}")));
        self.store(to_tier).add(&entry.text, metadata, Some(id.to_string())).await;
        source.delete(id).await;
    }

    /// Increment `metadata.access_count` for an entry, returning the new count.
    /// Returns 0 if the entry is not found.
    pub async fn increment_access(&self, tier: Tier, id: &str) -> u64 {
        let store = self.store(tier);
        let Some(entry) = store.get(id).await else {
            return 0;
        };

        let mut metadata = entry.metadata;
        let count = Self::access_count(&metadata) + 1;
        Self::set_field(&mut metadata, "access_count", Value::from(count));
        store.delete(id).await;
        store.add(&entry.text, metadata, Some(id.to_string())).await;
        count
    }

    /// Promote every short-term entry whose access count has reached the
    /// promotion threshold into long-term. Returns the count promoted.
    pub async fn auto_promote(&self) -> usize {
        let count = self.short_term.count().await;
        if count == 0 {
            return 0;
        }

        let entries = self.short_term.search("", count, None).await;
        let mut promoted = 0;
        for entry in entries {
            if Self::access_count(&entry.metadata) >= self.auto_promote_access_count {
                self.promote(Tier::ShortTerm, Tier::LongTerm, &entry.id).await;
                promoted += 1;
            }
        }
        promoted
    }

    /// Multiply every entry's access count in `tier` by the decay factor.
    /// Returns the count of entries affected (those with a nonzero count).
    pub async fn apply_decay(&self, tier: Tier) -> usize {
        let store = self.store(tier);
        let count = store.count().await;
        if count == 0 {
            return 0;
        }

        let entries = store.search("", count, None).await;
        let mut affected = 0;
        for entry in entries {
            let access_count = Self::access_count(&entry.metadata);
            if access_count == 0 {
                continue;
            }
            let mut metadata = entry.metadata;
            let decayed = (access_count as f64 * self.decay_factor) as u64;
            Self::set_field(&mut metadata, "access_count", Value::from(decayed));
            store.delete(&entry.id).await;
            store.add(&entry.text, metadata, Some(entry.id)).await;
            affected += 1;
        }
        affected
    }

    /// Entry counts per tier.
    pub async fn stats(&self) -> [(&'static str, usize); 3] {
        [
            ("working", self.working.count().await),
            ("short_term", self.short_term.count().await),
            ("long_term", self.long_term.count().await),
        ]
    }
}

impl Default for TieredMemory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn frequently_accessed_entries_auto_promote() {
        let memory = TieredMemory::new();
        let id = memory.short_term.add("important decision", Value::Null, Some("x".into())).await;

        for _ in 0..3 {
            memory.increment_access(Tier::ShortTerm, &id).await;
        }

        let promoted = memory.auto_promote().await;
        assert_eq!(promoted, 1);
        assert_eq!(memory.short_term.count().await, 0);
        assert_eq!(memory.long_term.count().await, 1);
    }

    #[tokio::test]
    async fn decay_reduces_access_count() {
        let memory = TieredMemory::new();
        let id = memory.working.add("note", Value::Null, Some("x".into())).await;
        memory.increment_access(Tier::Working, &id).await;
        memory.increment_access(Tier::Working, &id).await;

        let affected = memory.apply_decay(Tier::Working).await;
        assert_eq!(affected, 1);

        let entry = memory.working.get(&id).await.unwrap();
        assert_eq!(TieredMemory::access_count(&entry.metadata), 1);
    }
}
