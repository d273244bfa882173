// [[RARO]]/apps/eval-server/src/usage.rs
// Purpose: Reduces an agent's execution history into usage statistics.
// Architecture: Domain Logic Layer
// Dependencies: Models

use serde::{Deserialize, Serialize};

use crate::models::ExecutionRecord;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UsageStats {
    pub total_runs: usize,
    pub failures: usize,
    pub avg_input_tokens: f64,
    pub avg_output_tokens: f64,
    pub p50_latency_ms: f64,
    pub p95_latency_ms: f64,
}

/// Summarize a record sequence. Missing numeric fields count as zero.
pub fn aggregate(records: &[ExecutionRecord]) -> UsageStats {
    if records.is_empty() {
        return UsageStats::default();
    }

    let n = records.len();
    let failures = records.iter().filter(|r| !r.success).count();

    // Summed as f64: any u64 token count is accepted, so an integer sum can overflow.
    let input_sum: f64 = records.iter().map(|r| r.input_tokens.unwrap_or(0) as f64).sum();
    let output_sum: f64 = records.iter().map(|r| r.output_tokens.unwrap_or(0) as f64).sum();

    let mut latencies: Vec<f64> = records.iter().map(|r| r.runtime_ms.unwrap_or(0.0)).collect();
    latencies.sort_by(|a, b| a.total_cmp(b));

    UsageStats {
        total_runs: n,
        failures,
        avg_input_tokens: input_sum / n as f64,
        avg_output_tokens: output_sum / n as f64,
        p50_latency_ms: nearest_rank(&latencies, 0.50),
        p95_latency_ms: nearest_rank(&latencies, 0.95),
    }
}

/// Value at index floor(q * (n - 1)) of an ascending slice; 0 when empty.
pub fn nearest_rank(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let last = sorted.len() - 1;
    let idx = ((q * last as f64).floor() as usize).min(last);
    sorted[idx]
}
