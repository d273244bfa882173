// [[RARO]]/apps/eval-server/src/runtime.rs
// Purpose: Shared service state handed to every handler.
// Architecture: Domain Logic Layer
// Dependencies: Registry, Pricing, Gemini client

use std::sync::Arc;

use crate::config::{ServiceConfig, ServiceKind};
use crate::error::ServiceError;
use crate::gemini::{GeminiClient, TokenCounter};
use crate::models::*;
use crate::pricing::PricingTable;
use crate::registry::AgentRegistry;
use crate::scoring::CostScorer;
use crate::tokenstats;
use crate::usage::UsageStats;

pub struct EvalRuntime {
    pub config: ServiceConfig,
    pub registry: AgentRegistry,
    pub pricing: PricingTable,
    token_counter: Arc<dyn TokenCounter>,
}

impl EvalRuntime {
    pub fn new(config: ServiceConfig) -> Self {
        let counter = GeminiClient::new(config.google_api_key.clone(), config.gemini_api_base.clone());
        Self::with_token_counter(config, Arc::new(counter))
    }

    pub fn with_token_counter(config: ServiceConfig, token_counter: Arc<dyn TokenCounter>) -> Self {
        EvalRuntime {
            pricing: PricingTable::new(config.default_input_price_per_m, config.default_output_price_per_m),
            registry: AgentRegistry::new(),
            token_counter,
            config,
        }
    }

    pub fn kind(&self) -> ServiceKind {
        self.config.kind
    }

    // === TOKEN STATS ===

    pub async fn tokenize(&self, req: &TokenizeRequest) -> Result<TokenStats, ServiceError> {
        tokenstats::tokenize(self.token_counter.as_ref(), &self.pricing, req).await
    }

    // === REASONING COST ===

    fn scorer(&self) -> CostScorer<'_> {
        CostScorer::new(self.config.expected_tokens_per_step, &self.pricing)
    }

    pub fn estimate(&self, trace: &ReasoningTrace) -> Result<CostEstimate, ServiceError> {
        self.scorer().estimate(trace)
    }

    pub fn estimate_batch(&self, traces: &[ReasoningTrace]) -> Result<BatchEstimate, ServiceError> {
        self.scorer().estimate_batch(traces)
    }

    // === AGENT INVENTORY ===

    pub fn register_agent(&self, reg: AgentRegistration) -> Result<StatusResponse, ServiceError> {
        let summary = self.registry.register(reg)?;
        Ok(StatusResponse::success(format!("Agent {} registered/updated", summary.id)))
    }

    pub fn record_execution(&self, exec: NewExecution) -> Result<RecordExecutionResponse, ServiceError> {
        let agent_id = exec.agent_id.clone();
        let record = self.registry.record_execution(exec)?;
        Ok(RecordExecutionResponse {
            status: "success".to_string(),
            message: format!("Execution recorded for agent {}", agent_id),
            execution_id: record.execution_id,
        })
    }

    pub fn list_agents(&self) -> AgentList {
        AgentList {
            agents: self.registry.list(),
        }
    }

    pub fn agent_usage(&self, agent_id: &str) -> UsageStats {
        self.registry.usage(agent_id)
    }

    pub fn delete_agent(&self, agent_id: &str) -> Result<StatusResponse, ServiceError> {
        self.registry.delete(agent_id)?;
        Ok(StatusResponse::success(format!(
            "Agent {} and all its records deleted",
            agent_id
        )))
    }
}
