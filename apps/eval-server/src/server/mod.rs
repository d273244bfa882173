pub mod handlers;

use axum::{
    http::Method,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ServiceKind;
use crate::runtime::EvalRuntime;

/// Router for whichever service `runtime` was configured as.
pub fn router(runtime: Arc<EvalRuntime>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers(Any);

    let common = Router::new()
        .route("/", get(handlers::root).post(handlers::mcp_endpoint))
        .route("/health", get(handlers::health));

    let service = match runtime.kind() {
        ServiceKind::TokenStats => Router::new().route("/tokenize", post(handlers::tokenize)),
        ServiceKind::AgentInventory => Router::new()
            .route("/local/agents", get(handlers::list_local_agents))
            .route("/list_agents", get(handlers::list_local_agents))
            .route("/local/agents/:agent_id/usage", get(handlers::local_agent_usage))
            .route("/usage", get(handlers::usage_by_query))
            .route("/register_agent", post(handlers::register_agent))
            .route("/record_execution", post(handlers::record_execution))
            .route("/agent/:agent_id", delete(handlers::delete_agent)),
        ServiceKind::ReasoningCost => Router::new()
            .route("/estimate", post(handlers::estimate))
            .route("/estimate_multiple", post(handlers::estimate_multiple)),
    };

    common
        .merge(service)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(runtime)
}
