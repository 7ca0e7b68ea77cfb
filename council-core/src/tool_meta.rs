//! Tool registry data model (§3, §4.4): definitions, loaded-set budgeting.

use serde::{Deserialize, Serialize};

/// Static description of a tool, as registered with the tool search index.
///
/// `defer_loading` is always `true` in this model — a tool's schema is not
/// part of the system prompt until `search_and_load` loads it (§4.4).
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Unique tool name.
    pub name: String,
    /// Natural-language description, used by keyword/description search.
    pub description: String,
    /// Grouping for browsing (e.g. `"filesystem"`, `"git"`, `"network"`).
    pub category: String,
    /// JSON Schema for the tool's arguments.
    pub schema: serde_json::Value,
    /// Keywords boosting search relevance beyond the description.
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Estimated token footprint of this tool's schema once loaded.
    pub token_cost: u32,
    /// Always `true`: the registry never preloads tool schemas.
    pub defer_loading: bool,
}

impl ToolDefinition {
    /// Create a new tool definition. `defer_loading` is fixed to `true`.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        category: impl Into<String>,
        schema: serde_json::Value,
        token_cost: u32,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            category: category.into(),
            schema,
            keywords: Vec::new(),
            token_cost,
            defer_loading: true,
        }
    }
}
