// [[RARO]]/apps/eval-server/src/tokenstats.rs
// Purpose: Token statistics for a prompt: counts, estimates and USD cost.
// Architecture: Domain Logic Layer
// Dependencies: Gemini client, Pricing

use crate::error::ServiceError;
use crate::gemini::TokenCounter;
use crate::models::{TokenStats, TokenizeRequest};
use crate::pricing::{calculate_cost, round_to, PricingTable, FALLBACK_MODEL};

/// Context window of the default model.
pub const MAX_INPUT_TOKENS: u64 = 1_048_576;
pub const MAX_OUTPUT_TOKENS: u64 = 65_536;
/// Output estimate when no generation was requested.
pub const ESTIMATED_OUTPUT_RATIO: f64 = 0.4;

/// Only Gemini tokenizers are reachable; other names fall back.
pub fn normalize_model(requested: &str) -> String {
    let trimmed = requested.trim();
    if trimmed.to_ascii_lowercase().contains("gemini") {
        trimmed.to_string()
    } else {
        tracing::debug!("Model '{}' has no Gemini tokenizer, using {}", requested, FALLBACK_MODEL);
        FALLBACK_MODEL.to_string()
    }
}

pub async fn tokenize(
    counter: &dyn TokenCounter,
    pricing: &PricingTable,
    req: &TokenizeRequest,
) -> Result<TokenStats, ServiceError> {
    if !req.context_cache_storage_hours.is_finite() || req.context_cache_storage_hours < 0.0 {
        return Err(ServiceError::validation(
            "context_cache_storage_hours must be a non-negative number",
        ));
    }

    let model = normalize_model(&req.model);
    let input_tokens = counter.count_tokens(&model, &req.prompt).await?;

    let actual_output_tokens = if req.generate {
        let usage = counter.generate(&model, &req.prompt).await?;
        tracing::debug!(
            "Generation usage for {}: prompt={} output={} total={}",
            model,
            usage.prompt_tokens,
            usage.output_tokens,
            usage.total_tokens
        );
        Some(usage.output_tokens)
    } else {
        None
    };

    let estimated_output_tokens = match actual_output_tokens {
        Some(_) => None,
        None => Some(((input_tokens as f64 * ESTIMATED_OUTPUT_RATIO) as u64).min(MAX_OUTPUT_TOKENS)),
    };

    let output_for_cost = actual_output_tokens.or(estimated_output_tokens).unwrap_or(0);
    let breakdown = calculate_cost(
        &pricing.resolve(&model),
        input_tokens,
        output_for_cost,
        req.context_cache_tokens,
        req.context_cache_storage_hours,
    );

    let compression_ratio = if input_tokens > 0 {
        round_to(output_for_cost as f64 / input_tokens as f64, 2)
    } else {
        0.0
    };

    Ok(TokenStats {
        input_tokens,
        estimated_output_tokens,
        actual_output_tokens,
        estimated_cost_usd: breakdown.total_cost_usd,
        actual_cost_usd: actual_output_tokens.map(|_| breakdown.total_cost_usd),
        input_cost_usd: Some(breakdown.input_cost_usd),
        output_cost_usd: Some(breakdown.output_cost_usd),
        context_cache_cost_usd: breakdown.context_cache_cost_usd,
        model,
        pricing_tier: Some(breakdown.pricing_tier.as_str().to_string()),
        input_price_per_m: Some(breakdown.input_price_per_m),
        output_price_per_m: Some(breakdown.output_price_per_m),
        max_tokens_remaining: MAX_INPUT_TOKENS as i64 - input_tokens as i64,
        compression_ratio: Some(compression_ratio),
    })
}
