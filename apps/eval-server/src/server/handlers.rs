// [[RARO]]/apps/eval-server/src/server/handlers.rs
// Purpose: API Handlers for the three evaluation services plus the MCP shim.
// Architecture: API Layer
// Dependencies: Axum, Runtime

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::config::ServiceKind;
use crate::error::ServiceError;
use crate::mcp::{self, JsonRpcRequest, JsonRpcResponse, SERVER_VERSION};
use crate::models::*;
use crate::runtime::EvalRuntime;
use crate::usage::UsageStats;

#[derive(serde::Deserialize)]
pub struct UsageQuery {
    agent: Option<String>,
}

#[derive(serde::Serialize)]
pub struct HealthResponse {
    status: String,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
    })
}

pub async fn root(State(runtime): State<Arc<EvalRuntime>>) -> Json<Value> {
    let kind = runtime.kind();
    let mut banner = json!({
        "service": kind.title(),
        "version": SERVER_VERSION,
        "status": "running",
    });

    match kind {
        ServiceKind::TokenStats => {
            banner["endpoints"] = json!({ "tokenize": "POST /tokenize" });
            banner["gemini_configured"] = json!(runtime.config.google_api_key.is_some());
        }
        ServiceKind::AgentInventory => {
            banner["endpoints"] = json!({
                "local_agents": "GET /local/agents",
                "local_usage": "GET /local/agents/{agent_id}/usage",
                "record_execution": "POST /record_execution",
                "register_agent": "POST /register_agent",
                "delete_agent": "DELETE /agent/{agent_id}",
                "list_agents": "GET /list_agents [DEPRECATED - use /local/agents]",
                "usage": "GET /usage?agent={agent_id} [DEPRECATED - use /local/agents/{agent_id}/usage]",
            });
            banner["agent_count"] = json!(runtime.registry.agent_count());
            banner["total_executions"] = json!(runtime.registry.total_executions());
        }
        ServiceKind::ReasoningCost => {
            banner["endpoints"] = json!({
                "estimate": "POST /estimate",
                "estimate_multiple": "POST /estimate_multiple",
            });
            banner["expected_tokens_per_step"] = json!(runtime.config.expected_tokens_per_step);
        }
    }

    Json(banner)
}

pub async fn mcp_endpoint(
    State(runtime): State<Arc<EvalRuntime>>,
    payload: Result<Json<JsonRpcRequest>, JsonRejection>,
) -> Json<JsonRpcResponse> {
    match payload {
        Ok(Json(request)) => Json(mcp::handle(&runtime, request).await),
        Err(rejection) => {
            tracing::warn!("Unparseable MCP request: {}", rejection.body_text());
            Json(JsonRpcResponse::parse_error(rejection.body_text()))
        }
    }
}

// === TOKEN STATS ===

pub async fn tokenize(
    State(runtime): State<Arc<EvalRuntime>>,
    payload: Result<Json<TokenizeRequest>, JsonRejection>,
) -> Result<Json<TokenStats>, ServiceError> {
    let Json(request) = payload?;
    runtime.tokenize(&request).await.map(Json)
}

// === REASONING COST ===

pub async fn estimate(
    State(runtime): State<Arc<EvalRuntime>>,
    payload: Result<Json<EstimateRequest>, JsonRejection>,
) -> Result<Json<CostEstimate>, ServiceError> {
    let Json(request) = payload?;
    runtime.estimate(&request.trace).map(Json)
}

pub async fn estimate_multiple(
    State(runtime): State<Arc<EvalRuntime>>,
    payload: Result<Json<BatchEstimateRequest>, JsonRejection>,
) -> Result<Json<BatchEstimate>, ServiceError> {
    let Json(request) = payload?;
    runtime.estimate_batch(&request.traces).map(Json)
}

// === AGENT INVENTORY ===

pub async fn list_local_agents(State(runtime): State<Arc<EvalRuntime>>) -> Json<AgentList> {
    Json(runtime.list_agents())
}

pub async fn local_agent_usage(
    State(runtime): State<Arc<EvalRuntime>>,
    Path(agent_id): Path<String>,
) -> Json<UsageStats> {
    Json(runtime.agent_usage(&agent_id))
}

/// Deprecated query-string form of `local_agent_usage`.
pub async fn usage_by_query(
    State(runtime): State<Arc<EvalRuntime>>,
    Query(query): Query<UsageQuery>,
) -> Result<Json<UsageStats>, ServiceError> {
    let agent_id = query
        .agent
        .filter(|a| !a.is_empty())
        .ok_or_else(|| ServiceError::validation("agent query parameter is required"))?;
    Ok(Json(runtime.agent_usage(&agent_id)))
}

pub async fn register_agent(
    State(runtime): State<Arc<EvalRuntime>>,
    payload: Result<Json<AgentRegistration>, JsonRejection>,
) -> Result<Json<StatusResponse>, ServiceError> {
    let Json(registration) = payload?;
    runtime.register_agent(registration).map(Json)
}

pub async fn record_execution(
    State(runtime): State<Arc<EvalRuntime>>,
    payload: Result<Json<NewExecution>, JsonRejection>,
) -> Result<Json<RecordExecutionResponse>, ServiceError> {
    let Json(execution) = payload?;
    runtime.record_execution(execution).map(Json)
}

pub async fn delete_agent(
    State(runtime): State<Arc<EvalRuntime>>,
    Path(agent_id): Path<String>,
) -> Result<Json<StatusResponse>, ServiceError> {
    runtime.delete_agent(&agent_id).map(Json)
}
