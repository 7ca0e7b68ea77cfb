#![deny(missing_docs)]
//! Blast-Radius Analyzer (C8, §4.8): impact-aware change routing.
//!
//! Builds an import graph by statically scanning every source file below a
//! root (skipping hidden and vendor directories), then answers "how many
//! files would changing these files affect". Reimplements the original's
//! `BlastRadiusAnalyzer`, generalized from AST-walking to a regex scan since
//! the orchestration scripts this analyzes are Python-shaped (see
//! `council-ptc`'s static-validation Open Question) but this crate has no
//! Python-parser dependency to lean on.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

const SKIP_DIRS: &[&str] = &["__pycache__", "node_modules", ".venv", "venv", ".git", "target"];

static IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*(?:import\s+([\w.]+)|from\s+([\w.]+)\s+import)").expect("static pattern is valid")
});

/// Impact bucket for a set of changed files (§4.8 — note this is the
/// 3-bucket policy; an in-degree of 5+ is HIGH regardless of how deep the
/// transitive graph goes).
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImpactLevel {
    /// No other file in the graph imports any of the target files.
    Low,
    /// 1-4 files import one of the target files.
    Medium,
    /// 5 or more files import one of the target files.
    High,
}

/// Result of [`BlastRadiusAnalyzer::calculate_impact`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpactAnalysis {
    /// The bucketed impact level.
    pub level: ImpactLevel,
    /// Count of files that import one of the targets.
    pub incoming_deps: usize,
    /// Count of distinct modules the targets import.
    pub outgoing_deps: usize,
    /// Paths (relative to root) that import one of the targets.
    pub dependents: Vec<String>,
    /// Module names the targets import.
    pub dependencies: Vec<String>,
}

/// Analyzes the blast radius of changing a set of files within a project root.
pub struct BlastRadiusAnalyzer {
    root_dir: PathBuf,
    import_graph: Option<HashMap<String, HashSet<String>>>,
}

impl BlastRadiusAnalyzer {
    /// Create an analyzer rooted at `root_dir`. The import graph is built
    /// lazily on first use and cached until [`BlastRadiusAnalyzer::clear_cache`].
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self { root_dir: root_dir.into(), import_graph: None }
    }

    /// Drop the cached import graph. Call after files change on disk.
    pub fn clear_cache(&mut self) {
        self.import_graph = None;
    }

    fn build_import_graph(&mut self) -> &HashMap<String, HashSet<String>> {
        if self.import_graph.is_none() {
            let mut graph = HashMap::new();
            for file in Self::walk_source_files(&self.root_dir) {
                let imports = Self::extract_imports(&file);
                if let Ok(rel) = file.strip_prefix(&self.root_dir) {
                    graph.insert(rel.to_string_lossy().replace('\\', "/"), imports);
                }
            }
            self.import_graph = Some(graph);
        }
        self.import_graph.as_ref().expect("just built")
    }

    fn walk_source_files(dir: &Path) -> Vec<PathBuf> {
        let mut files = Vec::new();
        let Ok(entries) = std::fs::read_dir(dir) else {
            return files;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
                if name.starts_with('.') || SKIP_DIRS.contains(&name) {
                    continue;
                }
                files.extend(Self::walk_source_files(&path));
            } else if path.extension().and_then(|e| e.to_str()) == Some("py") {
                files.push(path);
            }
        }
        files
    }

    fn extract_imports(file: &Path) -> HashSet<String> {
        let Ok(content) = std::fs::read_to_string(file) else {
            return HashSet::new();
        };
        IMPORT_RE
            .captures_iter(&content)
            .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
            .map(|m| m.as_str().split('.').next().unwrap_or(m.as_str()).to_string())
            .collect()
    }

    fn module_name(rel_path: &str) -> String {
        let without_ext = rel_path.trim_end_matches(".py");
        without_ext.split('/').next().unwrap_or(without_ext).to_string()
    }

    fn find_dependents(&mut self, target_files: &[String]) -> Vec<String> {
        let targets: HashSet<String> = target_files.iter().cloned().collect();
        let target_modules: HashSet<String> = target_files.iter().map(|f| Self::module_name(f)).collect();
        let graph = self.build_import_graph();

        graph
            .iter()
            .filter(|(path, imports)| !targets.contains(*path) && !imports.is_disjoint(&target_modules))
            .map(|(path, _)| path.clone())
            .collect()
    }

    fn find_dependencies(&mut self, target_files: &[String]) -> Vec<String> {
        let graph = self.build_import_graph();
        let mut deps = HashSet::new();
        for file in target_files {
            if let Some(imports) = graph.get(file) {
                deps.extend(imports.iter().cloned());
            }
        }
        deps.into_iter().collect()
    }

    /// Calculate the impact of changing `target_files` (paths relative to root).
    pub fn calculate_impact(&mut self, target_files: &[String]) -> ImpactAnalysis {
        let dependents = self.find_dependents(target_files);
        let dependencies = self.find_dependencies(target_files);

        let incoming_deps = dependents.len();
        let level = match incoming_deps {
            0 => ImpactLevel::Low,
            1..=4 => ImpactLevel::Medium,
            _ => ImpactLevel::High,
        };

        ImpactAnalysis {
            level,
            incoming_deps,
            outgoing_deps: dependencies.len(),
            dependents,
            dependencies,
        }
    }

    /// `true` only for [`ImpactLevel::Low`] — changes with no dependents can
    /// skip full review.
    pub fn should_fast_track(&mut self, target_files: &[String]) -> bool {
        self.calculate_impact(target_files).level == ImpactLevel::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaf_file_with_no_dependents_is_low_impact() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("leaf.py"), "x = 1\n").unwrap();

        let mut analyzer = BlastRadiusAnalyzer::new(dir.path());
        let impact = analyzer.calculate_impact(&["leaf.py".to_string()]);
        assert_eq!(impact.level, ImpactLevel::Low);
        assert!(analyzer.should_fast_track(&["leaf.py".to_string()]));
    }

    #[test]
    fn widely_imported_file_is_high_impact() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("core.py"), "CONST = 1\n").unwrap();
        for i in 0..5 {
            std::fs::write(dir.path().join(format!("user{i}.py")), "import core\n").unwrap();
        }

        let mut analyzer = BlastRadiusAnalyzer::new(dir.path());
        let impact = analyzer.calculate_impact(&["core.py".to_string()]);
        assert_eq!(impact.level, ImpactLevel::High);
        assert_eq!(impact.incoming_deps, 5);
    }

    #[test]
    fn cache_reflects_new_files_only_after_clear() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("core.py"), "CONST = 1\n").unwrap();

        let mut analyzer = BlastRadiusAnalyzer::new(dir.path());
        assert_eq!(analyzer.calculate_impact(&["core.py".to_string()]).level, ImpactLevel::Low);

        std::fs::write(dir.path().join("user.py"), "import core\n").unwrap();
        assert_eq!(analyzer.calculate_impact(&["core.py".to_string()]).level, ImpactLevel::Low);

        analyzer.clear_cache();
        assert_eq!(analyzer.calculate_impact(&["core.py".to_string()]).level, ImpactLevel::Medium);
    }
}
