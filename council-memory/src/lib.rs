#![deny(missing_docs)]
//! Memory Fabric (C5, §4.5): tiered vector stores, a unifying aggregator,
//! rolling conversation context, a semantic response cache, and a knowledge
//! graph of entities and relations.
//!
//! Data shapes (`MemoryEntry`, `Tier`, `Entity`, `Relation`, `RoundEntry`,
//! `CacheEntry`, …) live in `council_core::memory_types`; this crate supplies
//! the operations over them.

mod aggregator;
mod knowledge_graph;
mod rolling_context;
mod semantic_cache;
mod tiered;
mod vector_store;

pub use aggregator::{MemoryAggregator, QueryResult, ReflectionReport};
pub use knowledge_graph::KnowledgeGraph;
pub use rolling_context::{RollingContext, RollingContextStats, Summarizer};
pub use semantic_cache::{CacheStats, SemanticCache};
pub use tiered::TieredMemory;
pub use vector_store::{InMemoryVectorStore, VectorStore};

pub use council_core::memory_types::{CacheEntry, Entity, EntityType, MemoryEntry, Relation, RelationType, RoundEntry, Tier};
