//! Text-generation provider abstraction and implementations.
//!
//! [`Generator`] is the port the answer assembler consumes: one prompt in,
//! one generated string out. Requests carry the same timeout and
//! retry/backoff contract as the embedding providers.

use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::config::GenerationConfig;
use crate::embedding::post_json_with_retry;
use crate::error::ProviderError;

/// Capability port: map a prompt to a generated answer string.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        max_new_tokens: u32,
        temperature: f32,
    ) -> Result<String, ProviderError>;
}

/// Create the appropriate [`Generator`] based on configuration.
pub fn create_generator(config: &GenerationConfig) -> Result<Box<dyn Generator>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledGenerator)),
        "hf" => Ok(Box::new(HfGenerator::new(config)?)),
        other => bail!("Unknown generation provider: {}", other),
    }
}

/// A no-op generation provider that always returns errors.
pub struct DisabledGenerator;

#[async_trait]
impl Generator for DisabledGenerator {
    async fn generate(
        &self,
        _prompt: &str,
        _max_new_tokens: u32,
        _temperature: f32,
    ) -> Result<String, ProviderError> {
        Err(ProviderError::new(
            "disabled",
            "generation provider is disabled; set [generation] provider in config",
        ))
    }
}

/// Generation provider using the Hugging Face Inference API text-generation
/// endpoint (`POST /models/{model}`).
///
/// Reads a bearer token from `HF_API_TOKEN` if present.
pub struct HfGenerator {
    model: String,
    base_url: String,
    token: Option<String>,
    max_retries: u32,
    client: reqwest::Client,
}

const HF_DEFAULT_BASE_URL: &str = "https://api-inference.huggingface.co";

impl HfGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("generation.model required for hf provider"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| HF_DEFAULT_BASE_URL.to_string()),
            token: std::env::var("HF_API_TOKEN").ok(),
            max_retries: config.max_retries,
            client,
        })
    }
}

#[async_trait]
impl Generator for HfGenerator {
    async fn generate(
        &self,
        prompt: &str,
        max_new_tokens: u32,
        temperature: f32,
    ) -> Result<String, ProviderError> {
        let url = format!("{}/models/{}", self.base_url, self.model);
        let body = serde_json::json!({
            "inputs": prompt,
            "parameters": {
                "max_new_tokens": max_new_tokens,
                "temperature": temperature,
            },
        });

        let json = post_json_with_retry(
            &self.client,
            &url,
            self.token.as_deref(),
            &body,
            self.max_retries,
            "hf",
        )
        .await?;

        // The API answers with [{"generated_text": "..."}].
        json.get(0)
            .and_then(|item| item.get("generated_text"))
            .and_then(|t| t.as_str())
            .map(str::to_string)
            .ok_or_else(|| {
                ProviderError::new("hf", format!("unexpected response shape: {}", json))
            })
    }
}
