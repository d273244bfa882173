//! Minimal MCP shim.
//!
//! JSON-RPC 2.0 messages posted to `/` are routed onto the same runtime
//! operations the REST endpoints use. Only `initialize`, `tools/list` and
//! `tools/call` are understood.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::ServiceKind;
use crate::error::ServiceError;
use crate::models::{AgentRegistration, NewExecution, ReasoningTrace, TokenizeRequest};
use crate::runtime::EvalRuntime;

/// JSON-RPC protocol version.
pub const JSONRPC_VERSION: &str = "2.0";

/// MCP protocol version announced on `initialize`.
pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";

pub const SERVER_VERSION: &str = "1.0.0";

/// Incoming JSON-RPC request. Every field is optional so that malformed
/// requests still get a JSON-RPC error instead of an HTTP rejection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub params: Option<Value>,
}

/// JSON-RPC error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
}

impl JsonRpcError {
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;

    pub fn new(code: i32, message: impl Into<String>) -> Self {
        JsonRpcError {
            code,
            message: message.into(),
        }
    }

    pub fn method_not_found(name: &str) -> Self {
        Self::new(Self::METHOD_NOT_FOUND, format!("Method not found: {}", name))
    }
}

impl From<ServiceError> for JsonRpcError {
    fn from(err: ServiceError) -> Self {
        let code = match err {
            ServiceError::Validation(_) | ServiceError::NotFound(_) => JsonRpcError::INVALID_PARAMS,
            _ => JsonRpcError::INTERNAL_ERROR,
        };
        JsonRpcError::new(code, err.to_string())
    }
}

/// JSON-RPC response; exactly one of `result` and `error` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        JsonRpcResponse {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Value, error: JsonRpcError) -> Self {
        JsonRpcResponse {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }

    pub fn parse_error(detail: impl std::fmt::Display) -> Self {
        Self::failure(
            Value::Null,
            JsonRpcError::new(JsonRpcError::PARSE_ERROR, format!("Parse error: {}", detail)),
        )
    }
}

pub async fn handle(runtime: &EvalRuntime, request: JsonRpcRequest) -> JsonRpcResponse {
    let id = request.id.clone().unwrap_or(Value::Null);

    let method = match request.method.as_deref() {
        Some(m) => m,
        None => {
            return JsonRpcResponse::failure(
                id,
                JsonRpcError::new(JsonRpcError::INVALID_REQUEST, "Missing method"),
            )
        }
    };

    if let Some(version) = request.jsonrpc.as_deref() {
        if version != JSONRPC_VERSION {
            return JsonRpcResponse::failure(
                id,
                JsonRpcError::new(
                    JsonRpcError::INVALID_REQUEST,
                    format!("Unsupported jsonrpc version: {}", version),
                ),
            );
        }
    }

    tracing::debug!("MCP request: {} (id={})", method, id);

    let outcome = match method {
        "initialize" => Ok(initialize_result(runtime.kind())),
        "tools/list" => Ok(json!({ "tools": tool_catalog(runtime.kind()) })),
        "tools/call" => call_tool(runtime, request.params.unwrap_or(Value::Null)).await,
        other => Err(JsonRpcError::method_not_found(other)),
    };

    match outcome {
        Ok(result) => JsonRpcResponse::success(id, result),
        Err(error) => JsonRpcResponse::failure(id, error),
    }
}

fn initialize_result(kind: ServiceKind) -> Value {
    json!({
        "protocolVersion": MCP_PROTOCOL_VERSION,
        "capabilities": { "tools": {} },
        "serverInfo": {
            "name": kind.server_name(),
            "version": SERVER_VERSION
        }
    })
}

async fn call_tool(runtime: &EvalRuntime, params: Value) -> Result<Value, JsonRpcError> {
    let name = params
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| JsonRpcError::new(JsonRpcError::INVALID_PARAMS, "Missing tool name"))?
        .to_string();
    let args = params.get("arguments").cloned().unwrap_or_else(|| json!({}));

    let result = match (runtime.kind(), name.as_str()) {
        (ServiceKind::TokenStats, "tokenize") => {
            let req: TokenizeRequest = serde_json::from_value(args).map_err(ServiceError::from)?;
            if req.model.trim().is_empty() || req.prompt.is_empty() {
                return Err(ServiceError::validation("model and prompt parameters are required").into());
            }
            text_content(&runtime.tokenize(&req).await?)
        }

        (ServiceKind::AgentInventory, "list_local_agents" | "list_agents") => {
            text_content(&runtime.list_agents())
        }
        (ServiceKind::AgentInventory, "get_local_agent_usage") => {
            let agent_id = required_str(&args, "agent_id")?;
            text_content(&runtime.agent_usage(&agent_id))
        }
        (ServiceKind::AgentInventory, "get_agent_usage") => {
            let agent_id = required_str(&args, "agent")?;
            text_content(&runtime.agent_usage(&agent_id))
        }
        (ServiceKind::AgentInventory, "register_agent") => {
            let reg: AgentRegistration = serde_json::from_value(args).map_err(ServiceError::from)?;
            text_content(&runtime.register_agent(reg)?)
        }
        (ServiceKind::AgentInventory, "record_execution") => {
            let exec: NewExecution = serde_json::from_value(args).map_err(ServiceError::from)?;
            text_content(&runtime.record_execution(exec)?)
        }
        (ServiceKind::AgentInventory, "delete_agent") => {
            let agent_id = required_str(&args, "agent_id")?;
            text_content(&runtime.delete_agent(&agent_id)?)
        }

        (ServiceKind::ReasoningCost, "estimate_reasoning_cost") => {
            let trace = args
                .get("trace")
                .cloned()
                .ok_or_else(|| ServiceError::validation("trace parameter is required"))?;
            let trace: ReasoningTrace = serde_json::from_value(trace).map_err(ServiceError::from)?;
            text_content(&runtime.estimate(&trace)?)
        }
        (ServiceKind::ReasoningCost, "estimate_multiple_traces") => {
            let traces = args
                .get("traces")
                .cloned()
                .ok_or_else(|| ServiceError::validation("traces parameter is required"))?;
            let traces: Vec<ReasoningTrace> =
                serde_json::from_value(traces).map_err(ServiceError::from)?;
            text_content(&runtime.estimate_batch(&traces)?)
        }

        (_, other) => return Err(JsonRpcError::method_not_found(other)),
    };

    result.map_err(JsonRpcError::from)
}

fn required_str(args: &Value, key: &str) -> Result<String, ServiceError> {
    args.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ServiceError::Validation(format!("{} parameter is required", key)))
}

fn text_content<T: Serialize>(result: &T) -> Result<Value, ServiceError> {
    let text = serde_json::to_string_pretty(result)
        .map_err(|e| ServiceError::Internal(format!("Failed to serialize result: {}", e)))?;
    Ok(json!({
        "content": [{ "type": "text", "text": text }]
    }))
}

pub fn tool_catalog(kind: ServiceKind) -> Vec<Value> {
    match kind {
        ServiceKind::TokenStats => vec![json!({
            "name": "tokenize",
            "description": "Tokenize text and return token usage statistics with cost calculation using Gemini API pricing",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "model": {
                        "type": "string",
                        "description": "Model name (e.g., gemini-2.5-flash, gemini-2.5-pro). Non-Gemini names are tokenized with gemini-2.5-flash."
                    },
                    "prompt": { "type": "string", "description": "Text to tokenize" },
                    "generate": {
                        "type": "boolean",
                        "description": "If true, run a real generation to report actual output tokens and cost.",
                        "default": false
                    },
                    "context_cache_tokens": { "type": "integer", "description": "Tokens held in context cache" },
                    "context_cache_storage_hours": { "type": "number", "description": "Hours of context cache storage" }
                },
                "required": ["model", "prompt"]
            }
        })],
        ServiceKind::AgentInventory => vec![
            json!({
                "name": "list_local_agents",
                "description": "List all local agents in the inventory with their metadata",
                "inputSchema": { "type": "object", "properties": {} }
            }),
            json!({
                "name": "get_local_agent_usage",
                "description": "Get usage statistics (runs, failures, token averages, p50/p95 latency) for a local agent",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "agent_id": { "type": "string", "description": "The ID of the agent" }
                    },
                    "required": ["agent_id"]
                }
            }),
            json!({
                "name": "list_agents",
                "description": "Deprecated alias of list_local_agents",
                "inputSchema": { "type": "object", "properties": {} }
            }),
            json!({
                "name": "get_agent_usage",
                "description": "Deprecated alias of get_local_agent_usage",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "agent": { "type": "string", "description": "The ID of the agent" }
                    },
                    "required": ["agent"]
                }
            }),
            json!({
                "name": "register_agent",
                "description": "Register or update agent metadata",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "id": { "type": "string" },
                        "description": { "type": "string" },
                        "avg_cost": { "type": "number" },
                        "avg_latency": { "type": "number" }
                    },
                    "required": ["id", "description"]
                }
            }),
            json!({
                "name": "record_execution",
                "description": "Record an agent execution",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "agent_id": { "type": "string" },
                        "execution_id": { "type": "string" },
                        "timestamp": { "type": "string" },
                        "success": { "type": "boolean", "default": true },
                        "runtime_ms": { "type": "number" },
                        "input_tokens": { "type": "integer" },
                        "output_tokens": { "type": "integer" },
                        "total_tokens": { "type": "integer" },
                        "cost_usd": { "type": "number" },
                        "error_message": { "type": "string" }
                    },
                    "required": ["agent_id"]
                }
            }),
            json!({
                "name": "delete_agent",
                "description": "Delete an agent and all its execution records",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "agent_id": { "type": "string", "description": "The ID of the agent to delete" }
                    },
                    "required": ["agent_id"]
                }
            }),
        ],
        ServiceKind::ReasoningCost => {
            let trace_schema = json!({
                "type": "object",
                "properties": {
                    "steps": { "type": "integer", "description": "Number of reasoning steps" },
                    "tool_calls": { "type": "integer", "description": "Number of tool invocations" },
                    "tokens_in_trace": { "type": "integer", "description": "Total tokens in the reasoning trace" },
                    "expected_tokens_per_step": { "type": "number", "description": "Baseline tokens per step (optional)" },
                    "input_tokens": { "type": "integer", "description": "Input tokens for LLM cost calculation (optional)" },
                    "output_tokens": { "type": "integer", "description": "Output tokens for LLM cost calculation (optional)" },
                    "model": { "type": "string", "description": "Model name for pricing (optional)" }
                },
                "required": ["steps", "tool_calls", "tokens_in_trace"]
            });
            vec![
                json!({
                    "name": "estimate_reasoning_cost",
                    "description": "Estimate reasoning cost based on trace metrics. Returns the relative cost_score and, when token counts are given, the LLM cost in USD.",
                    "inputSchema": {
                        "type": "object",
                        "properties": { "trace": trace_schema.clone() },
                        "required": ["trace"]
                    }
                }),
                json!({
                    "name": "estimate_multiple_traces",
                    "description": "Estimate reasoning cost for multiple traces (batch processing)",
                    "inputSchema": {
                        "type": "object",
                        "properties": {
                            "traces": {
                                "type": "array",
                                "description": "List of trace objects",
                                "items": trace_schema
                            }
                        },
                        "required": ["traces"]
                    }
                }),
            ]
        }
    }
}
