// [[RARO]]/apps/eval-server/src/config.rs
// Purpose: Boot-time configuration resolved from environment variables.
// Architecture: Application Boot
// Dependencies: std::env, anyhow

use std::env;
use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, bail, Context};

pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_EXPECTED_TOKENS_PER_STEP: f64 = 150.0;
pub const DEFAULT_INPUT_PRICE_PER_M: f64 = 1.25;
pub const DEFAULT_OUTPUT_PRICE_PER_M: f64 = 10.00;

/// Which of the three services this process serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    TokenStats,
    AgentInventory,
    ReasoningCost,
}

impl ServiceKind {
    pub fn default_port(&self) -> u16 {
        match self {
            ServiceKind::TokenStats => 8000,
            ServiceKind::AgentInventory => 8001,
            ServiceKind::ReasoningCost => 8002,
        }
    }

    /// Name announced over the MCP `initialize` handshake.
    pub fn server_name(&self) -> &'static str {
        match self {
            ServiceKind::TokenStats => "tokenstats",
            ServiceKind::AgentInventory => "agent-inventory",
            ServiceKind::ReasoningCost => "reasoning-cost",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            ServiceKind::TokenStats => "TokenStats MCP Server",
            ServiceKind::AgentInventory => "AgentInventory MCP Server",
            ServiceKind::ReasoningCost => "ReasoningCost MCP Server",
        }
    }
}

impl FromStr for ServiceKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tokenstats" | "token-stats" => Ok(ServiceKind::TokenStats),
            "agent-inventory" | "inventory" => Ok(ServiceKind::AgentInventory),
            "reasoning-cost" | "reasoning" => Ok(ServiceKind::ReasoningCost),
            other => Err(anyhow!(
                "Unknown service '{}'. Expected tokenstats, agent-inventory or reasoning-cost",
                other
            )),
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.server_name())
    }
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub kind: ServiceKind,
    pub port: u16,
    pub google_api_key: Option<String>,
    pub gemini_api_base: String,
    pub expected_tokens_per_step: f64,
    pub default_input_price_per_m: f64,
    pub default_output_price_per_m: f64,
}

impl ServiceConfig {
    /// Defaults for a given service, as if no optional variable were set.
    pub fn for_service(kind: ServiceKind) -> Self {
        ServiceConfig {
            kind,
            port: kind.default_port(),
            google_api_key: None,
            gemini_api_base: DEFAULT_GEMINI_API_BASE.to_string(),
            expected_tokens_per_step: DEFAULT_EXPECTED_TOKENS_PER_STEP,
            default_input_price_per_m: DEFAULT_INPUT_PRICE_PER_M,
            default_output_price_per_m: DEFAULT_OUTPUT_PRICE_PER_M,
        }
    }

    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let kind: ServiceKind = lookup("EVAL_SERVICE")
            .context("EVAL_SERVICE is not set (tokenstats | agent-inventory | reasoning-cost)")?
            .parse()?;

        let mut config = ServiceConfig::for_service(kind);

        if let Some(port) = lookup("PORT") {
            config.port = parse_var("PORT", &port)?;
        }
        config.google_api_key = lookup("GOOGLE_API_KEY").filter(|k| !k.trim().is_empty());
        if let Some(base) = lookup("GEMINI_API_BASE") {
            config.gemini_api_base = base.trim_end_matches('/').to_string();
        }
        if let Some(v) = lookup("EXPECTED_TOKENS_PER_STEP") {
            config.expected_tokens_per_step = parse_positive("EXPECTED_TOKENS_PER_STEP", &v)?;
        }
        if let Some(v) = lookup("LLM_INPUT_TOKEN_PRICE_PER_M") {
            config.default_input_price_per_m = parse_non_negative("LLM_INPUT_TOKEN_PRICE_PER_M", &v)?;
        }
        if let Some(v) = lookup("LLM_OUTPUT_TOKEN_PRICE_PER_M") {
            config.default_output_price_per_m =
                parse_non_negative("LLM_OUTPUT_TOKEN_PRICE_PER_M", &v)?;
        }

        Ok(config)
    }
}

fn parse_var<T: FromStr>(name: &str, raw: &str) -> anyhow::Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| anyhow!("Invalid value for {}: '{}'", name, raw))
}

fn parse_positive(name: &str, raw: &str) -> anyhow::Result<f64> {
    let value: f64 = parse_var(name, raw)?;
    if !value.is_finite() || value <= 0.0 {
        bail!("{} must be greater than zero", name);
    }
    Ok(value)
}

fn parse_non_negative(name: &str, raw: &str) -> anyhow::Result<f64> {
    let value: f64 = parse_var(name, raw)?;
    if !value.is_finite() || value < 0.0 {
        bail!("{} must be non-negative", name);
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_per_service() {
        let config = ServiceConfig::from_lookup(lookup_from(&[("EVAL_SERVICE", "reasoning-cost")]))
            .unwrap();
        assert_eq!(config.kind, ServiceKind::ReasoningCost);
        assert_eq!(config.port, 8002);
        assert_eq!(config.expected_tokens_per_step, 150.0);
        assert!(config.google_api_key.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = ServiceConfig::from_lookup(lookup_from(&[
            ("EVAL_SERVICE", "tokenstats"),
            ("PORT", "9100"),
            ("GOOGLE_API_KEY", "abc"),
            ("GEMINI_API_BASE", "http://localhost:9999/"),
            ("EXPECTED_TOKENS_PER_STEP", "100"),
        ]))
        .unwrap();
        assert_eq!(config.port, 9100);
        assert_eq!(config.google_api_key.as_deref(), Some("abc"));
        assert_eq!(config.gemini_api_base, "http://localhost:9999");
        assert_eq!(config.expected_tokens_per_step, 100.0);
    }

    #[test]
    fn test_missing_or_unknown_service_is_rejected() {
        let err = ServiceConfig::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(err.to_string().contains("EVAL_SERVICE is not set"));

        let err = ServiceConfig::from_lookup(lookup_from(&[("EVAL_SERVICE", "billing")])).unwrap_err();
        assert!(err.to_string().contains("Unknown service 'billing'"));
    }

    #[test]
    fn test_invalid_numbers_are_rejected() {
        let result = ServiceConfig::from_lookup(lookup_from(&[
            ("EVAL_SERVICE", "reasoning-cost"),
            ("EXPECTED_TOKENS_PER_STEP", "0"),
        ]));
        let err = result.unwrap_err();
        assert_eq!(err.to_string(), "EXPECTED_TOKENS_PER_STEP must be greater than zero");

        let result = ServiceConfig::from_lookup(lookup_from(&[
            ("EVAL_SERVICE", "agent-inventory"),
            ("PORT", "eighty"),
        ]));
        assert!(result.is_err());
    }
}
