//! [`KnowledgeGraph`]: arena-stored entities and relations, safe under cycles
//! since relations hold owned [`EntityId`]s rather than references.

use std::collections::HashMap;
use std::path::Path;

use council_core::error::MemoryError;
use council_core::id::EntityId;
use council_core::memory_types::{Entity, EntityType, Relation, RelationType};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Serialize, Deserialize)]
struct GraphSnapshot {
    entities: Vec<Entity>,
    relations: Vec<Relation>,
}

/// Entities live in a `Vec` arena; a `HashMap<EntityId, usize>` indexes into
/// it, and relations hold owned ids instead of references — so cycles
/// between entities never become borrow-checker or lifetime problems.
pub struct KnowledgeGraph {
    arena: Vec<Entity>,
    index: HashMap<EntityId, usize>,
    relations: Vec<Relation>,
}

impl KnowledgeGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self { arena: Vec::new(), index: HashMap::new(), relations: Vec::new() }
    }

    /// Insert or replace an entity.
    #[allow(clippy::too_many_arguments)]
    pub fn add_entity(
        &mut self,
        id: EntityId,
        entity_type: EntityType,
        name: impl Into<String>,
        properties: HashMap<String, Value>,
        now_ms: u64,
    ) {
        let entity = Entity { id: id.clone(), r#type: entity_type, name: name.into(), properties, created_at: now_ms, updated_at: now_ms };
        if let Some(&idx) = self.index.get(&id) {
            self.arena[idx] = entity;
        } else {
            self.index.insert(id, self.arena.len());
            self.arena.push(entity);
        }
    }

    /// Fetch an entity by id.
    pub fn get_entity(&self, id: &EntityId) -> Option<&Entity> {
        self.index.get(id).map(|&idx| &self.arena[idx])
    }

    /// Add a relation between two entities that must already exist.
    pub fn add_relation(
        &mut self,
        source_id: EntityId,
        target_id: EntityId,
        relation_type: RelationType,
        properties: HashMap<String, Value>,
        weight: f64,
        now_ms: u64,
    ) -> Result<(), MemoryError> {
        if !self.index.contains_key(&source_id) {
            return Err(MemoryError::UnknownEntity(source_id.to_string()));
        }
        if !self.index.contains_key(&target_id) {
            return Err(MemoryError::UnknownEntity(target_id.to_string()));
        }
        self.relations.push(Relation { source_id, target_id, r#type: relation_type, properties, weight, created_at: now_ms });
        Ok(())
    }

    /// Entities matching an optional type and/or property filter (all given
    /// properties must match exactly).
    pub fn query(&self, entity_type: Option<EntityType>, properties: Option<&HashMap<String, Value>>) -> Vec<&Entity> {
        self.arena
            .iter()
            .filter(|e| entity_type.is_none_or(|t| e.r#type == t))
            .filter(|e| properties.is_none_or(|props| props.iter().all(|(k, v)| e.properties.get(k) == Some(v))))
            .collect()
    }

    /// Relations with the given type, regardless of endpoints.
    pub fn relations_of_type(&self, relation_type: RelationType) -> Vec<&Relation> {
        self.relations.iter().filter(|r| r.r#type == relation_type).collect()
    }

    /// Entity count.
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    /// Whether the graph has no entities.
    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// Keyword-overlap search over entity names, mirroring
    /// [`crate::vector_store::VectorStore::search`]'s scoring but returning
    /// entities instead of document entries.
    pub fn search_hybrid(&self, query: &str, limit: usize) -> Vec<&Entity> {
        let query_words: Vec<String> = query.split_whitespace().filter(|w| w.len() > 2).map(|w| w.to_lowercase()).collect();
        if query_words.is_empty() {
            return self.arena.iter().take(limit).collect();
        }

        let mut scored: Vec<(&Entity, usize)> = self
            .arena
            .iter()
            .filter_map(|e| {
                let name_lower = e.name.to_lowercase();
                let hits = query_words.iter().filter(|w| name_lower.contains(w.as_str())).count();
                (hits > 0).then_some((e, hits))
            })
            .collect();
        scored.sort_by(|a, b| b.1.cmp(&a.1));
        scored.into_iter().take(limit).map(|(e, _)| e).collect()
    }

    /// Persist to `path` as JSON (`.json`) or a minimal GML graph (`.gml`),
    /// chosen by extension.
    pub fn save(&self, path: &Path) -> Result<(), MemoryError> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => {
                let snapshot = GraphSnapshot { entities: self.arena.clone(), relations: self.relations.clone() };
                let json = serde_json::to_string_pretty(&snapshot).map_err(|e| MemoryError::Serialization(e.to_string()))?;
                std::fs::write(path, json).map_err(|e| MemoryError::Io(e.to_string()))
            }
            Some("gml") => {
                let gml = self.to_gml();
                std::fs::write(path, gml).map_err(|e| MemoryError::Io(e.to_string()))
            }
            other => Err(MemoryError::UnsupportedFormat(other.unwrap_or("").to_string())),
        }
    }

    /// Load from `path`, replacing current contents. Only `.json` round-trips
    /// (`.gml` is write-only, as the original tooling never re-parses it).
    pub fn load(path: &Path) -> Result<Self, MemoryError> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => {
                let content = std::fs::read_to_string(path).map_err(|e| MemoryError::Io(e.to_string()))?;
                let snapshot: GraphSnapshot = serde_json::from_str(&content).map_err(|e| MemoryError::Serialization(e.to_string()))?;
                let mut graph = Self::new();
                for entity in snapshot.entities {
                    graph.index.insert(entity.id.clone(), graph.arena.len());
                    graph.arena.push(entity);
                }
                graph.relations = snapshot.relations;
                Ok(graph)
            }
            other => Err(MemoryError::UnsupportedFormat(other.unwrap_or("").to_string())),
        }
    }

    fn to_gml(&self) -> String {
        let mut out = String::from("graph [\n  directed 1\n");
        for (i, entity) in self.arena.iter().enumerate() {
            out.push_str(&format!("  node [\n    id {i}\n    label \"{}\"\n  ]\n", entity.name.replace('"', "'")));
        }
        for relation in &self.relations {
            let (Some(&src), Some(&dst)) = (self.index.get(&relation.source_id), self.index.get(&relation.target_id)) else {
                continue;
            };
            out.push_str(&format!("  edge [\n    source {src}\n    target {dst}\n    label \"{:?}\"\n  ]\n", relation.r#type));
        }
        out.push_str("]\n");
        out
    }
}

impl Default for KnowledgeGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relation_requires_both_entities_to_exist() {
        let mut graph = KnowledgeGraph::new();
        graph.add_entity(EntityId::new("a"), EntityType::Decision, "A", HashMap::new(), 0);
        let result = graph.add_relation(EntityId::new("a"), EntityId::new("missing"), RelationType::DependsOn, HashMap::new(), 1.0, 0);
        assert!(matches!(result, Err(MemoryError::UnknownEntity(_))));
    }

    #[test]
    fn cyclic_relations_are_fine_since_ids_are_owned() {
        let mut graph = KnowledgeGraph::new();
        graph.add_entity(EntityId::new("a"), EntityType::File, "A", HashMap::new(), 0);
        graph.add_entity(EntityId::new("b"), EntityType::File, "B", HashMap::new(), 0);
        graph.add_relation(EntityId::new("a"), EntityId::new("b"), RelationType::DependsOn, HashMap::new(), 1.0, 0).unwrap();
        graph.add_relation(EntityId::new("b"), EntityId::new("a"), RelationType::DependsOn, HashMap::new(), 1.0, 0).unwrap();
        assert_eq!(graph.relations_of_type(RelationType::DependsOn).len(), 2);
    }

    #[test]
    fn json_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.json");

        let mut graph = KnowledgeGraph::new();
        graph.add_entity(EntityId::new("a"), EntityType::File, "A", HashMap::new(), 0);
        graph.save(&path).unwrap();

        let loaded = KnowledgeGraph::load(&path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.get_entity(&EntityId::new("a")).unwrap().name, "A");
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.yaml");
        let graph = KnowledgeGraph::new();
        assert!(matches!(graph.save(&path), Err(MemoryError::UnsupportedFormat(_))));
    }
}
