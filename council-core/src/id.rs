//! Typed identifiers used throughout the council data model.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! typed_id {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Build from any string-like value.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the inner string.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

typed_id!(AgentId, "Identifies an agent within a council.");
typed_id!(SessionId, "Identifies a conversation session.");
typed_id!(WorkflowId, "Identifies a running or checkpointed workflow.");
typed_id!(ScopeId, "Identifies a custom state scope.");
typed_id!(TaskId, "Identifies a task managed by the orchestrator.");
typed_id!(CheckpointId, "Identifies a persisted workflow checkpoint.");
typed_id!(RequestId, "Identifies an approval request.");
typed_id!(EntityId, "Identifies a knowledge-graph entity.");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_inner() {
        let id = TaskId::new("t-1");
        assert_eq!(id.to_string(), "t-1");
        assert_eq!(id.as_str(), "t-1");
    }

    #[test]
    fn serializes_as_plain_string() {
        let id = AgentId::new("architect");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"architect\"");
    }
}
