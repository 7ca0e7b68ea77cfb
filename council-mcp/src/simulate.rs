//! `simulate_plan`: flag plan steps that delete something other entities
//! still depend on.

use council_core::memory_types::RelationType;
use council_memory::KnowledgeGraph;
use regex::Regex;
use std::sync::OnceLock;

const DELETE_KEYWORDS: &[&str] = &["delete", "rm", "remove", "unlink", "drop"];

fn quoted_target_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"["']([^"']+)["']"#).unwrap())
}

/// Whether a plan step names a delete-like operation.
pub fn is_delete_operation(step: &str) -> bool {
    let lower = step.to_lowercase();
    DELETE_KEYWORDS.iter().any(|kw| lower.split_whitespace().any(|w| w.trim_matches(|c: char| !c.is_alphanumeric()) == *kw))
}

/// Best-effort extraction of the thing a plan step names, preferring a
/// quoted substring and falling back to the first path-like token.
pub fn extract_target(step: &str) -> Option<String> {
    if let Some(caps) = quoted_target_re().captures(step) {
        return Some(caps[1].to_string());
    }
    step.split_whitespace()
        .find(|w| w.contains('/') || w.contains('.'))
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric() && c != '/' && c != '.' && c != '_' && c != '-').to_string())
        .filter(|s| !s.is_empty())
}

/// Entities whose name matches `target` and that have an inbound
/// `DependsOn` relation — i.e. things that would break if `target` were
/// removed.
pub fn find_dependents(graph: &KnowledgeGraph, target: &str) -> Vec<String> {
    let Some(target_entity) = graph.query(None, None).into_iter().find(|e| e.name == target) else {
        return Vec::new();
    };

    graph
        .relations_of_type(RelationType::DependsOn)
        .into_iter()
        .filter(|r| r.target_id == target_entity.id)
        .filter_map(|r| graph.get_entity(&r.source_id))
        .map(|e| e.name.clone())
        .collect()
}

/// Simulate a plan against the knowledge graph, returning one
/// `[DEP_CONFLICT]`-prefixed warning per delete step that has dependents.
pub fn simulate_plan(plan: &[String], graph: &KnowledgeGraph) -> Vec<String> {
    let mut warnings = Vec::new();

    for step in plan {
        if !is_delete_operation(step) {
            continue;
        }
        let Some(target) = extract_target(step) else { continue };
        let dependents = find_dependents(graph, &target);
        if !dependents.is_empty() {
            warnings.push(format!(
                "[DEP_CONFLICT] step {step:?} deletes {target:?}, which {} other entit{} depend{} on: {}",
                dependents.len(),
                if dependents.len() == 1 { "y" } else { "ies" },
                if dependents.len() == 1 { "s" } else { "" },
                dependents.join(", "),
            ));
        }
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use council_core::memory_types::EntityType;
    use std::collections::HashMap;

    fn graph_with_dependency() -> KnowledgeGraph {
        let mut g = KnowledgeGraph::new();
        g.add_entity("auth".into(), EntityType::File, "auth.rs", HashMap::new(), 0);
        g.add_entity("session".into(), EntityType::File, "session.rs", HashMap::new(), 0);
        g.add_relation("session".into(), "auth".into(), RelationType::DependsOn, HashMap::new(), 1.0, 0).unwrap();
        g
    }

    #[test]
    fn flags_delete_with_dependents() {
        let graph = graph_with_dependency();
        let plan = vec!["delete \"auth.rs\"".to_string()];
        let warnings = simulate_plan(&plan, &graph);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("DEP_CONFLICT"));
        assert!(warnings[0].contains("session.rs"));
    }

    #[test]
    fn ignores_delete_with_no_dependents() {
        let graph = graph_with_dependency();
        let plan = vec!["delete \"session.rs\"".to_string()];
        assert!(simulate_plan(&plan, &graph).is_empty());
    }

    #[test]
    fn ignores_non_delete_steps() {
        let graph = graph_with_dependency();
        let plan = vec!["refactor auth.rs to add logging".to_string()];
        assert!(simulate_plan(&plan, &graph).is_empty());
    }

    #[test]
    fn extract_target_falls_back_to_path_like_token() {
        assert_eq!(extract_target("rm src/main.rs"), Some("src/main.rs".to_string()));
        assert_eq!(extract_target("remove the old config"), None);
    }
}
