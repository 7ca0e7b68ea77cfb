//! Transport-free JSON-RPC 2.0 router over a fixed tool/resource surface.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use council_core::error::McpError;
use council_memory::KnowledgeGraph;
use serde_json::{json, Value};

use crate::simulate::simulate_plan;

/// A tool's name, description, and JSON Schema input shape, as returned by
/// `tools/list`.
#[derive(Debug, Clone)]
pub struct ToolDef {
    /// Tool name, as passed in `tools/call`'s `name` param.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// JSON Schema for `arguments`.
    pub input_schema: Value,
}

fn required_args(schema: &Value) -> Vec<String> {
    schema
        .get("required")
        .and_then(Value::as_array)
        .map(|a| a.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default()
}

/// The built-in `council_query` tool definition.
pub fn council_query_tool_def() -> ToolDef {
    ToolDef {
        name: "council_query".to_string(),
        description: "Query the AI Council for multi-model consensus".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "prompt": {"type": "string", "description": "The question or task to put to the council"}
            },
            "required": ["prompt"],
        }),
    }
}

/// The built-in `simulate_plan` tool definition.
pub fn simulate_plan_tool_def() -> ToolDef {
    ToolDef {
        name: "simulate_plan".to_string(),
        description: "Simulate a plan to detect potential conflicts".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "plan": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "List of plan steps to simulate",
                }
            },
            "required": ["plan"],
        }),
    }
}

/// A tool's execution logic: arguments in, JSON result or an internal
/// error out.
pub type ToolHandler = Box<dyn Fn(&Value) -> Result<Value, McpError> + Send + Sync>;

struct RegisteredTool {
    def: ToolDef,
    handler: ToolHandler,
}

/// JSON-RPC 2.0 handler for the MCP surface: `tools/list`, `tools/call`,
/// `resources/list`, plus the `council_query`/`simulate_plan` built-ins.
///
/// Holds no transport of its own — [`MCPProtocolHandler::handle_request`]
/// takes and returns plain `serde_json::Value` envelopes, so any transport
/// (stdio, HTTP, an in-process call) can drive it.
pub struct MCPProtocolHandler {
    tools: HashMap<String, RegisteredTool>,
    tool_order: Vec<String>,
    resources: Vec<Value>,
    knowledge_graph: Arc<Mutex<KnowledgeGraph>>,
}

impl MCPProtocolHandler {
    /// Build a handler with the built-in tools registered, backed by the
    /// given knowledge graph (or a fresh empty one).
    pub fn new(knowledge_graph: Option<Arc<Mutex<KnowledgeGraph>>>) -> Self {
        let knowledge_graph = knowledge_graph.unwrap_or_else(|| Arc::new(Mutex::new(KnowledgeGraph::new())));

        let mut handler = Self {
            tools: HashMap::new(),
            tool_order: Vec::new(),
            resources: vec![
                json!({
                    "uri": "council://knowledge_graph",
                    "name": "Knowledge Graph",
                    "description": "Project dependency knowledge graph",
                    "mimeType": "application/json",
                }),
                json!({
                    "uri": "council://governance/policies",
                    "name": "Governance Policies",
                    "description": "Active governance policies and risk levels",
                    "mimeType": "application/json",
                }),
            ],
            knowledge_graph: knowledge_graph.clone(),
        };

        handler.register_tool(council_query_tool_def(), Box::new(handle_council_query));

        let kg = knowledge_graph;
        handler.register_tool(
            simulate_plan_tool_def(),
            Box::new(move |args: &Value| {
                let plan: Vec<String> = args
                    .get("plan")
                    .and_then(Value::as_array)
                    .map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
                    .unwrap_or_default();
                let graph = kg.lock().expect("knowledge graph lock poisoned");
                Ok(json!(simulate_plan(&plan, &graph)))
            }),
        );

        handler
    }

    /// Register a tool beyond the two built-ins.
    pub fn register_tool(&mut self, def: ToolDef, handler: ToolHandler) {
        self.tool_order.push(def.name.clone());
        self.tools.insert(def.name.clone(), RegisteredTool { def, handler });
    }

    /// Route one JSON-RPC 2.0 request object to the matching handler.
    pub fn handle_request(&self, request: &Value) -> Value {
        let Some(obj) = request.as_object() else {
            return error_response(Value::Null, McpError::InvalidRequest("request is not an object".to_string()));
        };
        let request_id = obj.get("id").cloned().unwrap_or(Value::Null);

        let Some(method) = obj.get("method").and_then(Value::as_str) else {
            return error_response(request_id, McpError::InvalidRequest("missing 'method' field".to_string()));
        };

        match method {
            "tools/list" => self.handle_tools_list(request_id),
            "tools/call" => self.handle_tools_call(request_id, obj.get("params").cloned().unwrap_or_else(|| json!({}))),
            "resources/list" => self.handle_resources_list(request_id),
            other => error_response(request_id, McpError::MethodNotFound(other.to_string())),
        }
    }

    fn handle_tools_list(&self, request_id: Value) -> Value {
        let tools: Vec<Value> = self
            .tool_order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|t| json!({"name": t.def.name, "description": t.def.description, "inputSchema": t.def.input_schema}))
            .collect();
        success_response(request_id, json!({"tools": tools}))
    }

    fn handle_resources_list(&self, request_id: Value) -> Value {
        success_response(request_id, json!({"resources": self.resources}))
    }

    fn handle_tools_call(&self, request_id: Value, params: Value) -> Value {
        let Some(tool_name) = params.get("name").and_then(Value::as_str) else {
            return error_response(request_id, McpError::InvalidParams("missing 'name' field".to_string()));
        };
        let arguments = params.get("arguments").cloned().unwrap_or_else(|| json!({}));

        let Some(tool) = self.tools.get(tool_name) else {
            return error_response(request_id, McpError::InvalidParams(format!("unknown tool: {tool_name}")));
        };

        for required in required_args(&tool.def.input_schema) {
            if arguments.get(&required).is_none() {
                return error_response(request_id, McpError::InvalidParams(format!("missing required argument: {required}")));
            }
        }

        match (tool.handler)(&arguments) {
            Ok(result) => success_response(request_id, json!({"content": result})),
            Err(e) => error_response(request_id, McpError::Internal(format!("tool execution failed: {e}"))),
        }
    }
}

fn handle_council_query(args: &Value) -> Result<Value, McpError> {
    let prompt = args.get("prompt").and_then(Value::as_str).unwrap_or("");
    Ok(json!(format!("council query received: {prompt}")))
}

fn success_response(request_id: Value, result: Value) -> Value {
    json!({"jsonrpc": "2.0", "id": request_id, "result": result})
}

fn error_response(request_id: Value, error: McpError) -> Value {
    json!({"jsonrpc": "2.0", "id": request_id, "error": {"code": error.code(), "message": error.to_string()}})
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tools_list_includes_both_builtins() {
        let handler = MCPProtocolHandler::new(None);
        let resp = handler.handle_request(&json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}));
        let names: Vec<&str> = resp["result"]["tools"].as_array().unwrap().iter().map(|t| t["name"].as_str().unwrap()).collect();
        assert!(names.contains(&"council_query"));
        assert!(names.contains(&"simulate_plan"));
    }

    #[test]
    fn resources_list_returns_two_entries() {
        let handler = MCPProtocolHandler::new(None);
        let resp = handler.handle_request(&json!({"jsonrpc": "2.0", "id": 1, "method": "resources/list"}));
        assert_eq!(resp["result"]["resources"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn unknown_method_yields_method_not_found() {
        let handler = MCPProtocolHandler::new(None);
        let resp = handler.handle_request(&json!({"jsonrpc": "2.0", "id": 1, "method": "bogus"}));
        assert_eq!(resp["error"]["code"], -32601);
    }

    #[test]
    fn tools_call_missing_required_arg_yields_invalid_params() {
        let handler = MCPProtocolHandler::new(None);
        let resp = handler.handle_request(&json!({
            "jsonrpc": "2.0", "id": 1, "method": "tools/call",
            "params": {"name": "council_query", "arguments": {}}
        }));
        assert_eq!(resp["error"]["code"], -32602);
    }

    #[test]
    fn tools_call_council_query_echoes_prompt() {
        let handler = MCPProtocolHandler::new(None);
        let resp = handler.handle_request(&json!({
            "jsonrpc": "2.0", "id": 1, "method": "tools/call",
            "params": {"name": "council_query", "arguments": {"prompt": "hello"}}
        }));
        assert!(resp["result"]["content"].as_str().unwrap().contains("hello"));
    }

    #[test]
    fn missing_method_field_yields_invalid_request() {
        let handler = MCPProtocolHandler::new(None);
        let resp = handler.handle_request(&json!({"jsonrpc": "2.0", "id": 1}));
        assert_eq!(resp["error"]["code"], -32600);
    }

    #[test]
    fn simulate_plan_tool_detects_conflicts_through_the_router() {
        use council_core::memory_types::{EntityType, RelationType};
        use std::collections::HashMap as Map;

        let mut graph = KnowledgeGraph::new();
        graph.add_entity("auth".into(), EntityType::File, "auth.rs", Map::new(), 0);
        graph.add_entity("session".into(), EntityType::File, "session.rs", Map::new(), 0);
        graph.add_relation("session".into(), "auth".into(), RelationType::DependsOn, Map::new(), 1.0, 0).unwrap();

        let handler = MCPProtocolHandler::new(Some(Arc::new(Mutex::new(graph))));
        let resp = handler.handle_request(&json!({
            "jsonrpc": "2.0", "id": 1, "method": "tools/call",
            "params": {"name": "simulate_plan", "arguments": {"plan": ["delete \"auth.rs\""]}}
        }));
        let warnings = resp["result"]["content"].as_array().unwrap();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].as_str().unwrap().contains("DEP_CONFLICT"));
    }
}
