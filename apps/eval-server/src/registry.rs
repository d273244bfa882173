// [[RARO]]/apps/eval-server/src/registry.rs
// Purpose: Agent Registry. Agent metadata plus each agent's execution history.
// Architecture: Domain Logic Layer
// Dependencies: DashMap, Models, Usage

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

use crate::error::ServiceError;
use crate::models::{AgentRegistration, AgentSummary, ExecutionRecord, NewExecution};
use crate::pricing::round_to;
use crate::usage::{self, UsageStats};

struct Agent {
    id: String,
    description: String,
    avg_cost: Option<f64>,
    avg_latency: Option<f64>,
    /// Listing position; assigned once at creation.
    seq: u64,
    executions: Vec<ExecutionRecord>,
}

impl Agent {
    fn new(id: &str, description: String, seq: u64) -> Self {
        Agent {
            id: id.to_string(),
            description,
            avg_cost: None,
            avg_latency: None,
            seq,
            executions: Vec::new(),
        }
    }

    /// Refresh averages from records carrying the value; leaves the stored
    /// value alone when no record has it.
    fn refresh_averages(&mut self) {
        if let Some(avg) = mean(self.executions.iter().filter_map(|r| r.cost_usd)) {
            self.avg_cost = Some(round_to(avg, 6));
        }
        if let Some(avg) = mean(self.executions.iter().filter_map(|r| r.runtime_ms)) {
            self.avg_latency = Some(round_to(avg, 2));
        }
    }

    fn summary(&self) -> AgentSummary {
        AgentSummary {
            id: self.id.clone(),
            description: self.description.clone(),
            avg_cost: self.avg_cost,
            avg_latency: self.avg_latency,
        }
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

pub struct AgentRegistry {
    agents: DashMap<String, Agent>,
    next_seq: AtomicU64,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self {
            agents: DashMap::new(),
            next_seq: AtomicU64::new(0),
        }
    }

    fn seq(&self) -> u64 {
        self.next_seq.fetch_add(1, Ordering::Relaxed)
    }

    /// Upsert metadata. Existing execution records are kept.
    pub fn register(&self, reg: AgentRegistration) -> Result<AgentSummary, ServiceError> {
        if reg.id.trim().is_empty() {
            return Err(ServiceError::validation("Agent id must not be empty"));
        }
        check_non_negative("avg_cost", reg.avg_cost)?;
        check_non_negative("avg_latency", reg.avg_latency)?;

        let mut agent = match self.agents.entry(reg.id.clone()) {
            Entry::Occupied(e) => e.into_ref(),
            Entry::Vacant(e) => {
                let seq = self.seq();
                e.insert(Agent::new(&reg.id, reg.description.clone(), seq))
            }
        };
        agent.description = reg.description;
        agent.avg_cost = reg.avg_cost;
        agent.avg_latency = reg.avg_latency;
        agent.refresh_averages();

        tracing::info!("Registered agent: [{}] {}", agent.id, agent.description);
        Ok(agent.summary())
    }

    /// Append an execution, creating the agent on first sight.
    pub fn record_execution(&self, exec: NewExecution) -> Result<ExecutionRecord, ServiceError> {
        if exec.agent_id.trim().is_empty() {
            return Err(ServiceError::validation("agent_id must not be empty"));
        }
        check_non_negative("runtime_ms", exec.runtime_ms)?;
        check_non_negative("cost_usd", exec.cost_usd)?;

        let mut agent = match self.agents.entry(exec.agent_id.clone()) {
            Entry::Occupied(e) => e.into_ref(),
            Entry::Vacant(e) => {
                let seq = self.seq();
                let description = format!("Agent {}", exec.agent_id);
                e.insert(Agent::new(&exec.agent_id, description, seq))
            }
        };

        let execution_id = match exec.execution_id {
            Some(id) => {
                if agent.executions.iter().any(|r| r.execution_id == id) {
                    return Err(ServiceError::Validation(format!(
                        "Execution {} already recorded for agent {}",
                        id, exec.agent_id
                    )));
                }
                id
            }
            None => format!("{}_{}", exec.agent_id, Uuid::new_v4()),
        };

        let record = ExecutionRecord {
            execution_id,
            timestamp: exec.timestamp.unwrap_or_else(|| Utc::now().to_rfc3339()),
            success: exec.success,
            runtime_ms: exec.runtime_ms,
            input_tokens: exec.input_tokens,
            output_tokens: exec.output_tokens,
            total_tokens: exec.total_tokens,
            cost_usd: exec.cost_usd,
            error_message: exec.error_message,
        };

        agent.executions.push(record.clone());
        agent.refresh_averages();

        tracing::info!(
            "Recorded execution {} for agent {} (success={})",
            record.execution_id,
            agent.id,
            record.success
        );
        Ok(record)
    }

    /// All agents in the order they were first created.
    pub fn list(&self) -> Vec<AgentSummary> {
        let mut entries: Vec<(u64, AgentSummary)> = self
            .agents
            .iter()
            .map(|a| (a.seq, a.summary()))
            .collect();
        entries.sort_by_key(|(seq, _)| *seq);
        entries.into_iter().map(|(_, s)| s).collect()
    }

    /// Usage statistics. Unknown agents yield the zero-record result.
    pub fn usage(&self, agent_id: &str) -> UsageStats {
        self.agents
            .get(agent_id)
            .map(|a| usage::aggregate(&a.executions))
            .unwrap_or_default()
    }

    /// Remove an agent together with all of its records.
    pub fn delete(&self, agent_id: &str) -> Result<usize, ServiceError> {
        let (_, agent) = self.agents.remove(agent_id).ok_or_else(|| {
            ServiceError::NotFound(format!("Agent {} not found in inventory", agent_id))
        })?;
        tracing::info!(
            "Deleted agent {} and {} execution records",
            agent_id,
            agent.executions.len()
        );
        Ok(agent.executions.len())
    }

    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    pub fn total_executions(&self) -> usize {
        self.agents.iter().map(|a| a.executions.len()).sum()
    }
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn check_non_negative(field: &str, value: Option<f64>) -> Result<(), ServiceError> {
    match value {
        Some(v) if !v.is_finite() || v < 0.0 => Err(ServiceError::Validation(format!(
            "{} must be a non-negative number",
            field
        ))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn exec(agent: &str, runtime: f64) -> NewExecution {
        NewExecution {
            agent_id: agent.to_string(),
            execution_id: None,
            timestamp: None,
            success: true,
            runtime_ms: Some(runtime),
            input_tokens: Some(100),
            output_tokens: Some(20),
            total_tokens: Some(120),
            cost_usd: Some(0.002),
            error_message: None,
        }
    }

    fn registration(id: &str, description: &str) -> AgentRegistration {
        AgentRegistration {
            id: id.to_string(),
            description: description.to_string(),
            avg_cost: None,
            avg_latency: None,
        }
    }

    #[test]
    fn test_record_creates_agent_implicitly() {
        let registry = AgentRegistry::new();
        let record = registry.record_execution(exec("summarizer", 250.0)).unwrap();
        assert!(record.execution_id.starts_with("summarizer_"));

        let agents = registry.list();
        assert_eq!(agents.len(), 1);
        assert_eq!(agents[0].description, "Agent summarizer");
        assert_eq!(agents[0].avg_latency, Some(250.0));
        assert_eq!(agents[0].avg_cost, Some(0.002));
    }

    #[test]
    fn test_list_preserves_insertion_order() {
        let registry = AgentRegistry::new();
        registry.register(registration("zeta", "last alphabetically")).unwrap();
        registry.record_execution(exec("alpha", 10.0)).unwrap();
        registry.register(registration("mid", "middle")).unwrap();
        // Re-registration keeps the original position.
        registry.register(registration("zeta", "updated")).unwrap();

        let ids: Vec<_> = registry.list().into_iter().map(|a| a.id).collect();
        assert_eq!(ids, vec!["zeta", "alpha", "mid"]);
        assert_eq!(registry.list()[0].description, "updated");
    }

    #[test]
    fn test_reregistration_keeps_records() {
        let registry = AgentRegistry::new();
        registry.record_execution(exec("planner", 100.0)).unwrap();
        registry.record_execution(exec("planner", 300.0)).unwrap();

        let mut reg = registration("planner", "Plans things");
        reg.avg_latency = Some(9999.0);
        let summary = registry.register(reg).unwrap();

        assert_eq!(summary.description, "Plans things");
        // Recorded runtimes take precedence over the submitted average.
        assert_eq!(summary.avg_latency, Some(200.0));
        assert_eq!(registry.usage("planner").total_runs, 2);
    }

    #[test]
    fn test_registration_averages_kept_without_records() {
        let registry = AgentRegistry::new();
        let mut reg = registration("critic", "Reviews output");
        reg.avg_cost = Some(0.01);
        reg.avg_latency = Some(820.0);
        let summary = registry.register(reg).unwrap();
        assert_eq!(summary.avg_cost, Some(0.01));
        assert_eq!(summary.avg_latency, Some(820.0));
    }

    #[test]
    fn test_duplicate_execution_id_rejected() {
        let registry = AgentRegistry::new();
        let mut first = exec("planner", 10.0);
        first.execution_id = Some("run-1".to_string());
        registry.record_execution(first.clone()).unwrap();

        let result = registry.record_execution(first);
        assert!(matches!(result, Err(ServiceError::Validation(_))));
        assert_eq!(registry.usage("planner").total_runs, 1);

        // Same id under a different agent is fine.
        let mut other = exec("critic", 10.0);
        other.execution_id = Some("run-1".to_string());
        assert!(registry.record_execution(other).is_ok());
    }

    #[test]
    fn test_negative_runtime_rejected() {
        let registry = AgentRegistry::new();
        let result = registry.record_execution(exec("planner", -5.0));
        assert!(matches!(result, Err(ServiceError::Validation(_))));
        assert_eq!(registry.agent_count(), 0);
    }

    #[test]
    fn test_usage_with_maximal_token_counts() {
        let registry = AgentRegistry::new();
        for _ in 0..2 {
            let mut big = exec("big", 10.0);
            big.input_tokens = Some(u64::MAX);
            registry.record_execution(big).unwrap();
        }

        let stats = registry.usage("big");
        assert_eq!(stats.total_runs, 2);
        assert_eq!(stats.avg_input_tokens, u64::MAX as f64);
        assert_eq!(stats.avg_output_tokens, 20.0);
    }

    #[test]
    fn test_usage_for_unknown_agent_is_zero() {
        let registry = AgentRegistry::new();
        assert_eq!(registry.usage("ghost"), UsageStats::default());
    }

    #[test]
    fn test_delete_discards_records() {
        let registry = AgentRegistry::new();
        registry.record_execution(exec("planner", 10.0)).unwrap();
        registry.record_execution(exec("planner", 20.0)).unwrap();

        assert_eq!(registry.delete("planner").unwrap(), 2);
        assert_eq!(registry.usage("planner"), UsageStats::default());
        assert!(registry.list().is_empty());
        assert!(matches!(registry.delete("planner"), Err(ServiceError::NotFound(_))));
    }

    #[test]
    fn test_totals() {
        let registry = AgentRegistry::new();
        registry.record_execution(exec("a", 1.0)).unwrap();
        registry.record_execution(exec("a", 2.0)).unwrap();
        registry.record_execution(exec("b", 3.0)).unwrap();
        assert_eq!(registry.agent_count(), 2);
        assert_eq!(registry.total_executions(), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_recording() {
        let registry = Arc::new(AgentRegistry::new());
        let mut handles = Vec::new();
        for i in 0..8 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                for j in 0..25 {
                    registry
                        .record_execution(exec("shared", (i * 25 + j) as f64))
                        .unwrap();
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(registry.usage("shared").total_runs, 200);
        assert_eq!(registry.list().len(), 1);
    }
}
