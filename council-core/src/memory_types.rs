//! Memory fabric data model (§3, §4.5): the shapes shared by `VectorStore`,
//! `TieredMemory`, the knowledge graph, the semantic cache, and the rolling
//! context. The operations over these types live in `council-memory`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::id::EntityId;

/// A memory tier. `TieredMemory` keeps one `VectorStore` per tier.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Volatile, current-task scratch memory.
    Working,
    /// Recently written, not yet consolidated.
    ShortTerm,
    /// Consolidated, durable memory.
    LongTerm,
}

/// Uniform entry shape returned by every memory tier and by hybrid search (§3).
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEntry {
    /// Unique identifier within its store.
    pub id: String,
    /// The stored text.
    pub text: String,
    /// Arbitrary metadata (access_count, promoted_from, consolidated_from, …).
    #[serde(default)]
    pub metadata: serde_json::Value,
    /// Similarity distance to a query. `None` outside search results.
    pub distance: Option<f64>,
}

impl MemoryEntry {
    /// Create a new entry with no computed distance.
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            metadata: serde_json::Value::Null,
            distance: None,
        }
    }
}

/// Kind of knowledge-graph entity (§3).
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    /// A source file.
    File,
    /// A function or method.
    Function,
    /// A class or type.
    Class,
    /// A recorded council decision.
    Decision,
    /// An agent identity.
    Agent,
    /// A task (mirrors `council_core::task::Task` by id, not by value).
    Task,
    /// A proposal under vote.
    Proposal,
    /// A governance policy.
    Policy,
}

/// A node in the knowledge graph (§3).
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    /// Unique identifier.
    pub id: EntityId,
    /// Entity kind.
    pub r#type: EntityType,
    /// Human-readable name.
    pub name: String,
    /// Arbitrary type-specific properties.
    #[serde(default)]
    pub properties: HashMap<String, serde_json::Value>,
    /// Unix timestamp, milliseconds, of creation.
    pub created_at: u64,
    /// Unix timestamp, milliseconds, of the last property mutation.
    pub updated_at: u64,
}

/// Kind of edge between two knowledge-graph entities (§3).
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationType {
    /// Source depends on target.
    DependsOn,
    /// Source implements target.
    Implements,
    /// Source contains target.
    Contains,
    /// Loosely related, no stronger claim.
    RelatedTo,
    /// Source was decided by target (a `Decision` entity).
    DecidedBy,
    /// Source was approved by target (an `Agent` entity).
    ApprovedBy,
    /// Source was created by target (an `Agent` entity).
    CreatedBy,
    /// Source supersedes target.
    Supersedes,
    /// Source imports target (a `File` entity).
    Imports,
}

/// An edge in the knowledge graph (§3).
///
/// Invariant: only valid if both `source_id` and `target_id` refer to
/// entities that already exist — enforced by `council-memory`, not by
/// this type.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relation {
    /// The source entity.
    pub source_id: EntityId,
    /// The target entity.
    pub target_id: EntityId,
    /// Edge kind.
    pub r#type: RelationType,
    /// Arbitrary edge-specific properties.
    #[serde(default)]
    pub properties: HashMap<String, serde_json::Value>,
    /// Edge weight, used by graph-ranked queries.
    pub weight: f64,
    /// Unix timestamp, milliseconds, of creation.
    pub created_at: u64,
}

/// One exchange in a [`crate::memory_types::RollingContext`] — renamed
/// `RoundEntry` per §3.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundEntry {
    /// Who produced this entry (e.g. `"user"`, `"architect"`).
    pub role: String,
    /// Serialized content (arbitrary JSON, stored as text per §4.5).
    pub content: String,
    /// Estimated token count of `content`.
    pub token_count: u64,
    /// Monotonically increasing round number.
    pub round_number: u64,
}

/// Rolling, self-compacting conversation context (§3, §4.5).
///
/// Invariant: after each `add_turn` (see `council-memory`), if
/// `sum(token_count) > max_tokens * compression_threshold`, the oldest
/// half of `recent` is summarized into `past_summary` and removed.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollingContext {
    /// Content that never rolls off (identity, task brief, …).
    pub static_context: String,
    /// Rolling summary of everything compacted out of `recent` so far.
    pub past_summary: String,
    /// Entries not yet compacted, oldest first.
    pub recent: Vec<RoundEntry>,
    /// Token budget for `recent`.
    pub max_tokens: u64,
    /// Fraction of `max_tokens` that triggers compaction, in `(0, 1)`.
    pub compression_threshold: f64,
}

impl RollingContext {
    /// Create a new, empty rolling context.
    pub fn new(max_tokens: u64, compression_threshold: f64) -> Self {
        Self {
            static_context: String::new(),
            past_summary: String::new(),
            recent: Vec::new(),
            max_tokens,
            compression_threshold,
        }
    }

    /// Total estimated tokens currently held in `recent`.
    pub fn recent_tokens(&self) -> u64 {
        self.recent.iter().map(|e| e.token_count).sum()
    }

    /// Whether `recent` has exceeded the compaction trigger.
    pub fn needs_compaction(&self) -> bool {
        (self.recent_tokens() as f64) > (self.max_tokens as f64) * self.compression_threshold
    }
}

/// A cached query/response pair (§3, §4.5).
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Original query text.
    pub query: String,
    /// Cached response.
    pub response: serde_json::Value,
    /// First 16 hex characters of `sha256(query)`, used as the exact-match key.
    pub query_hash: String,
    /// Unix timestamp, milliseconds, of creation.
    pub created_at: u64,
    /// Number of times this entry has been returned as a hit.
    pub hits: u64,
    /// Arbitrary metadata.
    #[serde(default)]
    pub metadata: serde_json::Value,
    /// Time-to-live, in seconds, from `created_at`.
    pub ttl: u64,
}

impl CacheEntry {
    /// Whether this entry has outlived its `ttl`, given the current time.
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.created_at) > self.ttl.saturating_mul(1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compaction_triggers_past_threshold() {
        let mut ctx = RollingContext::new(1000, 0.7);
        ctx.recent.push(RoundEntry {
            role: "user".into(),
            content: "hi".into(),
            token_count: 800,
            round_number: 1,
        });
        assert!(ctx.needs_compaction());
    }

    #[test]
    fn cache_entry_expires_after_ttl() {
        let entry = CacheEntry {
            query: "q".into(),
            response: serde_json::Value::Null,
            query_hash: "abc".into(),
            created_at: 0,
            hits: 0,
            metadata: serde_json::Value::Null,
            ttl: 3600,
        };
        assert!(!entry.is_expired(1000));
        assert!(entry.is_expired(3_600_001));
    }
}
