// [[RARO]]/apps/eval-server/src/scoring.rs
// Purpose: Reasoning cost scoring for chain-of-thought trace summaries.
// Architecture: Domain Logic Layer
// Dependencies: Models, Pricing

use crate::error::ServiceError;
use crate::models::{BatchEstimate, CostEstimate, ReasoningTrace};
use crate::pricing::{per_million, round_to, PricingTable};

const STEPS_SCALE: f64 = 20.0;
const STEPS_WEIGHT: f64 = 0.4;
const TOOL_CALLS_SCALE: f64 = 10.0;
const TOOL_CALLS_WEIGHT: f64 = 0.3;
const EXPANSION_WEIGHT: f64 = 0.3;

pub struct CostScorer<'a> {
    expected_tokens_per_step: f64,
    pricing: &'a PricingTable,
}

impl<'a> CostScorer<'a> {
    pub fn new(expected_tokens_per_step: f64, pricing: &'a PricingTable) -> Self {
        CostScorer {
            expected_tokens_per_step,
            pricing,
        }
    }

    pub fn estimate(&self, trace: &ReasoningTrace) -> Result<CostEstimate, ServiceError> {
        validate(trace)?;

        let expected = trace
            .expected_tokens_per_step
            .unwrap_or(self.expected_tokens_per_step);
        let expansion = expansion_factor(trace.tokens_in_trace as u64, trace.steps as u64, expected);
        if !expansion.is_finite() {
            return Err(ServiceError::validation(
                "Expected tokens per step is too small to produce a finite expansion factor",
            ));
        }
        let score = cost_score(trace.steps as u64, trace.tool_calls as u64, expansion);

        let mut estimate = CostEstimate {
            reasoning_depth: trace.steps as u64,
            tool_invocations: trace.tool_calls as u64,
            expansion_factor: expansion,
            cost_score: score,
            estimated_cost_usd: None,
            input_tokens: None,
            output_tokens: None,
            model: trace.model.clone(),
            input_cost_usd: None,
            output_cost_usd: None,
        };

        if trace.input_tokens.is_some() || trace.output_tokens.is_some() {
            let input = trace.input_tokens.map(|t| t as u64);
            let output = trace.output_tokens.map(|t| t as u64);
            let (input_rate, output_rate) = self.pricing.base_rates(trace.model.as_deref());

            let input_cost = input.map(|t| per_million(t, input_rate));
            let output_cost = output.map(|t| per_million(t, output_rate));
            let total = input_cost.unwrap_or(0.0) + output_cost.unwrap_or(0.0);

            estimate.estimated_cost_usd = Some(round_to(total, 6));
            estimate.input_cost_usd = input_cost.map(|c| round_to(c, 6));
            estimate.output_cost_usd = output_cost.map(|c| round_to(c, 6));
            estimate.input_tokens = input;
            estimate.output_tokens = output;
            estimate.model = Some(trace.model.clone().unwrap_or_else(|| "default".to_string()));
        }

        Ok(estimate)
    }

    /// Scores each trace independently. The first invalid trace fails the batch.
    pub fn estimate_batch(&self, traces: &[ReasoningTrace]) -> Result<BatchEstimate, ServiceError> {
        let estimates = traces
            .iter()
            .enumerate()
            .map(|(i, trace)| {
                self.estimate(trace).map_err(|e| match e {
                    ServiceError::Validation(msg) => {
                        ServiceError::Validation(format!("traces[{}]: {}", i, msg))
                    }
                    other => other,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(BatchEstimate {
            count: estimates.len(),
            estimates,
        })
    }
}

fn validate(trace: &ReasoningTrace) -> Result<(), ServiceError> {
    if trace.steps < 0 {
        return Err(ServiceError::validation("Steps must be non-negative"));
    }
    if trace.tool_calls < 0 {
        return Err(ServiceError::validation("Tool calls must be non-negative"));
    }
    if trace.tokens_in_trace < 0 {
        return Err(ServiceError::validation("Tokens in trace must be non-negative"));
    }
    if matches!(trace.input_tokens, Some(t) if t < 0) {
        return Err(ServiceError::validation("Input tokens must be non-negative"));
    }
    if matches!(trace.output_tokens, Some(t) if t < 0) {
        return Err(ServiceError::validation("Output tokens must be non-negative"));
    }
    if let Some(expected) = trace.expected_tokens_per_step {
        if !expected.is_finite() || expected <= 0.0 {
            return Err(ServiceError::validation(
                "Expected tokens per step must be greater than zero",
            ));
        }
    }
    Ok(())
}

/// Ratio of actual to expected trace tokens, rounded to two decimals.
/// Zero steps are treated as one.
pub fn expansion_factor(tokens_in_trace: u64, steps: u64, expected_tokens_per_step: f64) -> f64 {
    let steps = steps.max(1) as f64;
    round_to(tokens_in_trace as f64 / steps / expected_tokens_per_step, 2)
}

pub fn cost_score(steps: u64, tool_calls: u64, expansion_factor: f64) -> f64 {
    let steps_part = (steps as f64 / STEPS_SCALE).clamp(0.0, STEPS_WEIGHT);
    let tools_part = (tool_calls as f64 / TOOL_CALLS_SCALE).clamp(0.0, TOOL_CALLS_WEIGHT);
    let expansion_part = ((expansion_factor - 1.0) / 2.0).clamp(0.0, EXPANSION_WEIGHT);
    round_to(steps_part + tools_part + expansion_part, 2)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> PricingTable {
        PricingTable::new(1.25, 10.00)
    }

    #[test]
    fn test_reference_trace() {
        let pricing = table();
        let scorer = CostScorer::new(150.0, &pricing);
        let est = scorer.estimate(&ReasoningTrace::new(8, 3, 1189)).unwrap();
        assert_eq!(est.reasoning_depth, 8);
        assert_eq!(est.tool_invocations, 3);
        assert_eq!(est.expansion_factor, 0.99);
        assert!((est.cost_score - 0.70).abs() < 1e-9);
        assert!(est.estimated_cost_usd.is_none());
        assert!(est.model.is_none());
    }

    #[test]
    fn test_zero_steps_uses_unit_denominator() {
        assert_eq!(expansion_factor(300, 0, 150.0), 2.0);
        assert_eq!(expansion_factor(0, 0, 150.0), 0.0);
    }

    #[test]
    fn test_verbose_trace_saturates_expansion_term() {
        let pricing = table();
        let scorer = CostScorer::new(150.0, &pricing);
        let est = scorer.estimate(&ReasoningTrace::new(2, 0, 3000)).unwrap();
        assert_eq!(est.expansion_factor, 10.0);
        assert!((est.cost_score - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_per_trace_expected_tokens_override() {
        let pricing = table();
        let scorer = CostScorer::new(150.0, &pricing);
        let mut trace = ReasoningTrace::new(8, 3, 1189);
        trace.expected_tokens_per_step = Some(100.0);
        let est = scorer.estimate(&trace).unwrap();
        assert_eq!(est.expansion_factor, 1.49);
        assert!((est.cost_score - 0.95).abs() < 1e-9);
    }

    #[test]
    fn test_subnormal_expected_tokens_rejected() {
        let pricing = table();
        let scorer = CostScorer::new(150.0, &pricing);
        let mut trace = ReasoningTrace::new(8, 3, 1189);
        trace.expected_tokens_per_step = Some(1e-320);
        let result = scorer.estimate(&trace);
        assert!(matches!(result, Err(ServiceError::Validation(_))));

        // A tiny but representable ratio still scores.
        trace.expected_tokens_per_step = Some(1e-3);
        let est = scorer.estimate(&trace).unwrap();
        assert!(est.expansion_factor.is_finite());
        assert_eq!(est.cost_score, 1.0);
    }

    #[test]
    fn test_negative_inputs_rejected() {
        let pricing = table();
        let scorer = CostScorer::new(150.0, &pricing);
        for trace in [
            ReasoningTrace::new(-1, 0, 0),
            ReasoningTrace::new(0, -1, 0),
            ReasoningTrace::new(0, 0, -1),
        ] {
            assert!(matches!(scorer.estimate(&trace), Err(ServiceError::Validation(_))));
        }

        let mut trace = ReasoningTrace::new(1, 1, 1);
        trace.expected_tokens_per_step = Some(0.0);
        assert!(matches!(scorer.estimate(&trace), Err(ServiceError::Validation(_))));
    }

    #[test]
    fn test_score_non_negative_and_monotone() {
        let mut last = 0.0;
        for tool_calls in 0..15 {
            let s = cost_score(5, tool_calls, 1.2);
            assert!(s >= last);
            last = s;
        }

        let mut last = 0.0;
        for tokens in (0..20_000).step_by(250) {
            let s = cost_score(6, 2, expansion_factor(tokens, 6, 150.0));
            assert!(s >= 0.0);
            assert!(s >= last);
            last = s;
        }

        // With no trace tokens the expansion term stays at zero.
        let mut last = 0.0;
        for steps in 0..30 {
            let s = cost_score(steps, 1, expansion_factor(0, steps, 150.0));
            assert!(s >= last);
            last = s;
        }
    }

    #[test]
    fn test_llm_cost_breakdown() {
        let pricing = table();
        let scorer = CostScorer::new(150.0, &pricing);
        let mut trace = ReasoningTrace::new(4, 1, 600);
        trace.input_tokens = Some(200_000);
        trace.output_tokens = Some(10_000);
        trace.model = Some("gemini-1.5-flash".to_string());

        let est = scorer.estimate(&trace).unwrap();
        assert_eq!(est.input_cost_usd, Some(0.015));
        assert_eq!(est.output_cost_usd, Some(0.003));
        assert_eq!(est.estimated_cost_usd, Some(0.018));
        assert_eq!(est.model.as_deref(), Some("gemini-1.5-flash"));
    }

    #[test]
    fn test_llm_cost_defaults_without_model() {
        let pricing = table();
        let scorer = CostScorer::new(150.0, &pricing);
        let mut trace = ReasoningTrace::new(1, 0, 100);
        trace.output_tokens = Some(1_000_000);

        let est = scorer.estimate(&trace).unwrap();
        assert_eq!(est.input_cost_usd, None);
        assert_eq!(est.output_cost_usd, Some(10.0));
        assert_eq!(est.estimated_cost_usd, Some(10.0));
        assert_eq!(est.model.as_deref(), Some("default"));
    }

    #[test]
    fn test_batch_preserves_order() {
        let pricing = table();
        let scorer = CostScorer::new(150.0, &pricing);
        let traces = vec![
            ReasoningTrace::new(8, 3, 1189),
            ReasoningTrace::new(0, 0, 0),
            ReasoningTrace::new(25, 12, 9000),
        ];

        let batch = scorer.estimate_batch(&traces).unwrap();
        assert_eq!(batch.count, 3);
        for (trace, est) in traces.iter().zip(&batch.estimates) {
            assert_eq!(est, &scorer.estimate(trace).unwrap());
        }
    }

    #[test]
    fn test_batch_reports_offending_index() {
        let pricing = table();
        let scorer = CostScorer::new(150.0, &pricing);
        let traces = vec![ReasoningTrace::new(1, 1, 1), ReasoningTrace::new(1, -2, 1)];
        match scorer.estimate_batch(&traces) {
            Err(ServiceError::Validation(msg)) => assert!(msg.starts_with("traces[1]")),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_empty_batch() {
        let pricing = table();
        let scorer = CostScorer::new(150.0, &pricing);
        let batch = scorer.estimate_batch(&[]).unwrap();
        assert_eq!(batch.count, 0);
        assert!(batch.estimates.is_empty());
    }
}
