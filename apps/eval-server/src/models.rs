use serde::{Deserialize, Serialize};

fn default_success() -> bool {
    true
}

/// Execution report as submitted by a caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewExecution {
    pub agent_id: String,
    pub execution_id: Option<String>,
    pub timestamp: Option<String>,
    #[serde(default = "default_success")]
    pub success: bool,
    pub runtime_ms: Option<f64>,
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
    pub total_tokens: Option<u64>,
    pub cost_usd: Option<f64>,
    pub error_message: Option<String>,
}

/// A recorded execution. Never mutated once appended to its agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutionRecord {
    pub execution_id: String,
    pub timestamp: String,
    pub success: bool,
    pub runtime_ms: Option<f64>,
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
    pub total_tokens: Option<u64>,
    pub cost_usd: Option<f64>,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRegistration {
    pub id: String,
    pub description: String,
    pub avg_cost: Option<f64>,
    pub avg_latency: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentSummary {
    pub id: String,
    pub description: String,
    pub avg_cost: Option<f64>,
    pub avg_latency: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentList {
    pub agents: Vec<AgentSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordExecutionResponse {
    pub status: String,
    pub message: String,
    pub execution_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    pub message: String,
}

impl StatusResponse {
    pub fn success(message: impl Into<String>) -> Self {
        StatusResponse {
            status: "success".to_string(),
            message: message.into(),
        }
    }
}

/// Summary of one chain-of-thought episode.
///
/// Counts are signed on the wire so that negative values can be rejected
/// with a precise message instead of a generic decode failure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReasoningTrace {
    pub steps: i64,
    pub tool_calls: i64,
    pub tokens_in_trace: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_tokens_per_step: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

#[cfg(test)]
impl ReasoningTrace {
    pub fn new(steps: i64, tool_calls: i64, tokens_in_trace: i64) -> Self {
        ReasoningTrace {
            steps,
            tool_calls,
            tokens_in_trace,
            expected_tokens_per_step: None,
            input_tokens: None,
            output_tokens: None,
            model: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimateRequest {
    pub trace: ReasoningTrace,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchEstimateRequest {
    #[serde(default)]
    pub traces: Vec<ReasoningTrace>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CostEstimate {
    pub reasoning_depth: u64,
    pub tool_invocations: u64,
    pub expansion_factor: f64,
    pub cost_score: f64,
    pub estimated_cost_usd: Option<f64>,
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
    pub model: Option<String>,
    pub input_cost_usd: Option<f64>,
    pub output_cost_usd: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchEstimate {
    pub estimates: Vec<CostEstimate>,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenizeRequest {
    pub model: String,
    pub prompt: String,
    #[serde(default)]
    pub generate: bool,
    #[serde(default)]
    pub context_cache_tokens: u64,
    #[serde(default)]
    pub context_cache_storage_hours: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenStats {
    pub input_tokens: u64,
    pub estimated_output_tokens: Option<u64>,
    pub actual_output_tokens: Option<u64>,
    pub estimated_cost_usd: f64,
    pub actual_cost_usd: Option<f64>,
    pub input_cost_usd: Option<f64>,
    pub output_cost_usd: Option<f64>,
    pub context_cache_cost_usd: Option<f64>,
    pub model: String,
    pub pricing_tier: Option<String>,
    pub input_price_per_m: Option<f64>,
    pub output_price_per_m: Option<f64>,
    pub max_tokens_remaining: i64,
    pub compression_ratio: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_execution_defaults() {
        let exec: NewExecution = serde_json::from_value(json!({"agent_id": "planner"})).unwrap();
        assert!(exec.success);
        assert!(exec.execution_id.is_none());
        assert!(exec.runtime_ms.is_none());
    }

    #[test]
    fn test_negative_tokens_fail_to_decode() {
        let result: Result<NewExecution, _> =
            serde_json::from_value(json!({"agent_id": "planner", "input_tokens": -4}));
        assert!(result.is_err());
    }

    #[test]
    fn test_tokenize_request_defaults() {
        let req: TokenizeRequest =
            serde_json::from_value(json!({"model": "gemini-2.5-flash", "prompt": "hi"})).unwrap();
        assert!(!req.generate);
        assert_eq!(req.context_cache_tokens, 0);
        assert_eq!(req.context_cache_storage_hours, 0.0);
    }
}
