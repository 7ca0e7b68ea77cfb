//! Static validation of a PTC script before it ever reaches the sandbox (§4.3 step 1).

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

static FORBIDDEN_IMPORTS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "os", "sys", "subprocess", "shutil", "pathlib", "importlib", "builtins",
        "__builtins__", "eval", "exec",
    ]
    .into_iter()
    .collect()
});

static FORBIDDEN_NAMES: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    ["__import__", "__loader__", "__spec__", "__builtins__", "__file__", "__name__"]
        .into_iter()
        .collect()
});

static FORBIDDEN_CALLS: &[&str] = &["eval", "exec", "compile", "open", "__import__", "getattr", "setattr", "globals", "locals"];

static IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*(?:import\s+([\w.]+)|from\s+([\w.]+)\s+import)").expect("static pattern is valid")
});

static NAME_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b([A-Za-z_][A-Za-z0-9_]*)\b").expect("static pattern is valid"));

/// Scans a script's source text for forbidden imports, names, and calls.
///
/// There is no Python-AST crate in this codebase's dependency stack, so
/// this validates with whole-word regex matches over import statements and
/// identifiers rather than a true parse — the same pattern-list approach
/// `council-hook-builtins`'s pre-tool-use guardrail uses for shell commands.
pub struct CodeValidator {
    forbidden_imports: HashSet<&'static str>,
}

impl CodeValidator {
    /// Create a validator. `allowed_imports` is subtracted from the default
    /// forbidden set (e.g. a sandboxed container may permit `os`/`sys`).
    pub fn new(allowed_imports: &[&str]) -> Self {
        let mut forbidden = FORBIDDEN_IMPORTS.clone();
        for allowed in allowed_imports {
            forbidden.remove(allowed);
        }
        Self { forbidden_imports: forbidden }
    }

    /// Return every violation found; an empty vec means the script is clean.
    pub fn validate(&self, code: &str) -> Vec<String> {
        let mut violations = Vec::new();

        for caps in IMPORT_RE.captures_iter(code) {
            let module = caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str()).unwrap_or("");
            let root = module.split('.').next().unwrap_or(module);
            if self.forbidden_imports.contains(root) {
                violations.push(format!("forbidden import: {module}"));
            }
        }

        for caps in NAME_RE.captures_iter(code) {
            let name = &caps[1];
            if FORBIDDEN_NAMES.contains(name) {
                violations.push(format!("forbidden name: {name}"));
            }
            if FORBIDDEN_CALLS.contains(&name) {
                violations.push(format!("forbidden function: {name}"));
            }
        }

        violations
    }
}

impl Default for CodeValidator {
    fn default() -> Self {
        Self::new(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_script_has_no_violations() {
        let validator = CodeValidator::default();
        assert!(validator.validate("result = tools.read_file(path='a.txt')\noutput = result\n").is_empty());
    }

    #[test]
    fn flags_forbidden_import() {
        let validator = CodeValidator::default();
        let violations = validator.validate("import subprocess\nsubprocess.run(['ls'])\n");
        assert!(violations.iter().any(|v| v.contains("subprocess")));
    }

    #[test]
    fn flags_eval_call() {
        let validator = CodeValidator::default();
        let violations = validator.validate("result = eval(user_input)\n");
        assert!(violations.iter().any(|v| v.contains("eval")));
    }

    #[test]
    fn allowed_imports_override_default_forbidden_set() {
        let validator = CodeValidator::new(&["os"]);
        assert!(validator.validate("import os\nos.getcwd()\n").is_empty());
    }
}
