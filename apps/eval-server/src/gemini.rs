// [[RARO]]/apps/eval-server/src/gemini.rs
// Purpose: Token counting and generation against the Gemini REST API.
// Architecture: Infrastructure Layer
// Dependencies: reqwest, async-trait, serde_json

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::error::ServiceError;

/// Token usage reported by a real generation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationUsage {
    pub prompt_tokens: u64,
    /// Response plus thinking tokens.
    pub output_tokens: u64,
    pub total_tokens: u64,
}

#[async_trait]
pub trait TokenCounter: Send + Sync {
    async fn count_tokens(&self, model: &str, prompt: &str) -> Result<u64, ServiceError>;

    async fn generate(&self, model: &str, prompt: &str) -> Result<GenerationUsage, ServiceError>;
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CountTokensResponse {
    #[serde(default)]
    total_tokens: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
    #[serde(default)]
    thoughts_token_count: u64,
    #[serde(default)]
    total_token_count: u64,
}

pub struct GeminiClient {
    http_client: reqwest::Client,
    api_key: Option<String>,
    api_base: String,
}

impl GeminiClient {
    pub fn new(api_key: Option<String>, api_base: impl Into<String>) -> Self {
        if api_key.is_none() {
            tracing::warn!("GOOGLE_API_KEY not set. Token counting will fail until it is configured.");
        }
        GeminiClient {
            http_client: reqwest::Client::new(),
            api_key,
            api_base: api_base.into(),
        }
    }

    fn endpoint(&self, model: &str, action: &str) -> String {
        let model = model.strip_prefix("models/").unwrap_or(model);
        format!("{}/v1beta/models/{}:{}", self.api_base, model, action)
    }

    async fn call<T: for<'de> Deserialize<'de>>(
        &self,
        model: &str,
        action: &str,
        prompt: &str,
    ) -> Result<T, ServiceError> {
        let key = self.api_key.as_deref().ok_or_else(|| {
            ServiceError::Unavailable(
                "GOOGLE_API_KEY environment variable is not set. Please set it to use token counting."
                    .to_string(),
            )
        })?;

        let url = self.endpoint(model, action);
        tracing::debug!("Calling Gemini: {}", url);

        let response = self
            .http_client
            .post(&url)
            .header("x-goog-api-key", key)
            .json(&json!({
                "contents": [{ "parts": [{ "text": prompt }] }]
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Gemini {} failed for model {}: {} {}", action, model, status, body);
            return Err(ServiceError::Upstream(format!(
                "Gemini {} returned {}: {}",
                action, status, body
            )));
        }

        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl TokenCounter for GeminiClient {
    async fn count_tokens(&self, model: &str, prompt: &str) -> Result<u64, ServiceError> {
        let resp: CountTokensResponse = self.call(model, "countTokens", prompt).await?;
        Ok(resp.total_tokens)
    }

    async fn generate(&self, model: &str, prompt: &str) -> Result<GenerationUsage, ServiceError> {
        let resp: GenerateContentResponse = self.call(model, "generateContent", prompt).await?;
        let usage = resp.usage_metadata.unwrap_or_default();
        Ok(GenerationUsage {
            prompt_tokens: usage.prompt_token_count,
            output_tokens: usage.candidates_token_count.saturating_add(usage.thoughts_token_count),
            total_tokens: usage.total_token_count,
        })
    }
}
