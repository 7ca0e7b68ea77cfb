//! Task data model (§3). Tasks are immutable requests; only a `TaskManager`
//! (`council-executor`) mutates status — this module defines the shape.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::id::TaskId;

/// Lifecycle state of a [`Task`].
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    /// Created, not yet eligible to run (dependencies unresolved).
    Pending,
    /// Dispatched and running.
    InProgress,
    /// Finished successfully.
    Completed,
    /// Not runnable — waiting on an external condition other than dependencies.
    Blocked,
    /// Abandoned before completion.
    Cancelled,
}

/// An immutable unit of work tracked by the orchestrator (§3).
///
/// Invariant: a task with unresolved dependencies cannot become
/// `InProgress` — enforced by the `TaskManager`, not by this type.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier.
    pub id: TaskId,
    /// Human-readable description of the work.
    pub description: String,
    /// Scheduling priority; higher runs first.
    pub priority: u8,
    /// Tasks that must complete before this one can start.
    pub dependencies: Vec<TaskId>,
    /// Current lifecycle state.
    pub status: TaskStatus,
    /// Result payload, set once `status == Completed`.
    pub result: Option<serde_json::Value>,
    /// Unix timestamp, milliseconds, of creation.
    pub created_at: u64,
    /// Unix timestamp, milliseconds, of the last status mutation.
    pub updated_at: u64,
}

impl Task {
    /// Create a new, pending task.
    pub fn new(id: TaskId, description: impl Into<String>, priority: u8, now: u64) -> Self {
        Self {
            id,
            description: description.into(),
            priority,
            dependencies: Vec::new(),
            status: TaskStatus::Pending,
            result: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether every dependency is present in `completed`.
    pub fn dependencies_satisfied(&self, completed: &HashSet<TaskId>) -> bool {
        self.dependencies.iter().all(|d| completed.contains(d))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unresolved_dependency_blocks_readiness() {
        let mut task = Task::new(TaskId::new("t2"), "build", 5, 0);
        task.dependencies.push(TaskId::new("t1"));
        assert!(!task.dependencies_satisfied(&HashSet::new()));

        let mut completed = HashSet::new();
        completed.insert(TaskId::new("t1"));
        assert!(task.dependencies_satisfied(&completed));
    }
}
