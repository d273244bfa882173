// [[RARO]]/apps/eval-server/src/pricing.rs
// Purpose: Per-model token prices and USD cost breakdowns.
// Architecture: Domain Logic Layer
// Dependencies: Serde

use serde::{Deserialize, Serialize};

/// Prompts or outputs larger than this switch to extended pricing.
pub const EXTENDED_THRESHOLD: u64 = 200_000;

/// Context cache storage, USD per million tokens per hour.
pub const CONTEXT_CACHE_PRICE_PER_M_HOUR: f64 = 4.50;

pub const FALLBACK_MODEL: &str = "gemini-2.5-flash";

/// USD per million tokens.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelPricing {
    pub input: f64,
    pub output: f64,
    pub input_extended: Option<f64>,
    pub output_extended: Option<f64>,
    pub threshold: u64,
}

impl ModelPricing {
    const fn flat(input: f64, output: f64) -> Self {
        ModelPricing {
            input,
            output,
            input_extended: None,
            output_extended: None,
            threshold: EXTENDED_THRESHOLD,
        }
    }

    const fn tiered(input: f64, input_extended: f64, output: f64, output_extended: f64) -> Self {
        ModelPricing {
            input,
            output,
            input_extended: Some(input_extended),
            output_extended: Some(output_extended),
            threshold: EXTENDED_THRESHOLD,
        }
    }
}

const MODEL_PRICING: &[(&str, ModelPricing)] = &[
    ("gemini-2.5-pro", ModelPricing::tiered(1.25, 2.50, 10.00, 15.00)),
    ("gemini-2.5-flash", ModelPricing::flat(0.30, 2.50)),
    ("gemini-2.5-flash-preview-09-2025", ModelPricing::flat(0.30, 2.50)),
    ("gemini-1.5-pro", ModelPricing::tiered(1.25, 2.50, 5.00, 7.50)),
    ("gemini-1.5-flash", ModelPricing::flat(0.075, 0.30)),
    ("gemini-1.5-flash-8b", ModelPricing::flat(0.0375, 0.15)),
    ("gpt-4", ModelPricing::flat(10.00, 30.00)),
    ("gpt-4-turbo", ModelPricing::flat(10.00, 30.00)),
    ("gpt-3.5-turbo", ModelPricing::flat(0.50, 1.50)),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PricingTier {
    Standard,
    Extended,
}

impl PricingTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            PricingTier::Standard => "standard",
            PricingTier::Extended => "extended",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CostBreakdown {
    pub input_cost_usd: f64,
    pub output_cost_usd: f64,
    pub context_cache_cost_usd: Option<f64>,
    pub total_cost_usd: f64,
    pub input_price_per_m: f64,
    pub output_price_per_m: f64,
    pub pricing_tier: PricingTier,
}

/// Price lookup with a configurable default for unknown models.
#[derive(Debug, Clone)]
pub struct PricingTable {
    default_input_per_m: f64,
    default_output_per_m: f64,
}

impl PricingTable {
    pub fn new(default_input_per_m: f64, default_output_per_m: f64) -> Self {
        PricingTable {
            default_input_per_m,
            default_output_per_m,
        }
    }

    /// Case-insensitive exact match only.
    pub fn exact(&self, model: &str) -> Option<ModelPricing> {
        let key = model.to_ascii_lowercase();
        MODEL_PRICING
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, p)| *p)
    }

    /// Exact match, then substring match in either direction, then the
    /// fallback model's prices.
    pub fn resolve(&self, model: &str) -> ModelPricing {
        if let Some(p) = self.exact(model) {
            return p;
        }
        let key = model.trim().to_ascii_lowercase();
        if key.is_empty() {
            return ModelPricing::flat(0.30, 2.50);
        }
        MODEL_PRICING
            .iter()
            .find(|(name, _)| key.contains(name) || name.contains(key.as_str()))
            .map(|(_, p)| *p)
            .unwrap_or(ModelPricing::flat(0.30, 2.50))
    }

    /// Exact-match rates, falling back to the configured defaults.
    /// Extended tiers are not considered.
    pub fn base_rates(&self, model: Option<&str>) -> (f64, f64) {
        match model.and_then(|m| self.exact(m)) {
            Some(p) => (p.input, p.output),
            None => (self.default_input_per_m, self.default_output_per_m),
        }
    }
}

/// Full cost breakdown for one request against `pricing`.
pub fn calculate_cost(
    pricing: &ModelPricing,
    input_tokens: u64,
    output_tokens: u64,
    context_cache_tokens: u64,
    context_cache_storage_hours: f64,
) -> CostBreakdown {
    let (input_price, pricing_tier) = match pricing.input_extended {
        Some(ext) if input_tokens > pricing.threshold => (ext, PricingTier::Extended),
        _ => (pricing.input, PricingTier::Standard),
    };
    let output_price = match pricing.output_extended {
        Some(ext) if output_tokens > pricing.threshold => ext,
        _ => pricing.output,
    };

    let input_cost = per_million(input_tokens, input_price);
    let output_cost = per_million(output_tokens, output_price);

    let cache_cost = if context_cache_storage_hours > 0.0 && context_cache_tokens > 0 {
        per_million(context_cache_tokens, CONTEXT_CACHE_PRICE_PER_M_HOUR) * context_cache_storage_hours
    } else {
        0.0
    };

    CostBreakdown {
        input_cost_usd: round_to(input_cost, 6),
        output_cost_usd: round_to(output_cost, 6),
        context_cache_cost_usd: (cache_cost > 0.0).then(|| round_to(cache_cost, 6)),
        total_cost_usd: round_to(input_cost + output_cost + cache_cost, 6),
        input_price_per_m: input_price,
        output_price_per_m: output_price,
        pricing_tier,
    }
}

pub fn per_million(tokens: u64, price_per_m: f64) -> f64 {
    tokens as f64 / 1_000_000.0 * price_per_m
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
