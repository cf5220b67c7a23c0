//! Embedding provider abstraction and implementations.
//!
//! Defines the [`Embedder`] port the retrieval engine consumes — a batch of
//! strings in, one unit-normalized vector per string out — plus concrete
//! implementations:
//! - **[`DisabledEmbedder`]** — returns errors; used when embeddings are not configured.
//! - **[`HfEmbedder`]** — calls the Hugging Face Inference API feature-extraction pipeline.
//! - **[`OpenAiEmbedder`]** — calls the OpenAI embeddings API.
//!
//! All remote providers batch texts into a single request, enforce the
//! configured timeout, and retry transient failures with exponential
//! backoff:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)
//!
//! Vectors are L2-normalized on receipt, so inner product downstream is
//! cosine similarity.

use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::config::EmbeddingConfig;
use crate::error::ProviderError;

/// Capability port: map a batch of texts to fixed-dimension unit vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embedding vector dimensionality (e.g. `384`).
    fn dims(&self) -> usize;

    /// Embed a batch of texts, returning one vector per input in input
    /// order. Every returned vector has length [`Self::dims`] and unit norm.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError>;
}

/// Scale a vector to unit L2 norm in place. Zero vectors are left as-is.
pub fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Create the appropriate [`Embedder`] based on configuration.
///
/// | Config value | Provider |
/// |--------------|----------|
/// | `"disabled"` | [`DisabledEmbedder`] |
/// | `"hf"` | [`HfEmbedder`] |
/// | `"openai"` | [`OpenAiEmbedder`] |
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Box<dyn Embedder>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledEmbedder {
            dims: config.dims,
        })),
        "hf" => Ok(Box::new(HfEmbedder::new(config)?)),
        "openai" => Ok(Box::new(OpenAiEmbedder::new(config)?)),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

// ============ Disabled provider ============

/// A no-op embedding provider that always returns errors.
pub struct DisabledEmbedder {
    dims: usize,
}

#[async_trait]
impl Embedder for DisabledEmbedder {
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        Err(ProviderError::new(
            "disabled",
            "embedding provider is disabled; set [embedding] provider in config",
        ))
    }
}

// ============ Hugging Face provider ============

/// Embedding provider using the Hugging Face Inference API
/// feature-extraction pipeline for sentence-transformers models.
///
/// Reads a bearer token from `HF_API_TOKEN` if present; public models can
/// be queried without one.
pub struct HfEmbedder {
    model: String,
    dims: usize,
    base_url: String,
    token: Option<String>,
    max_retries: u32,
    client: reqwest::Client,
}

const HF_DEFAULT_BASE_URL: &str = "https://api-inference.huggingface.co";

impl HfEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required for hf provider"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model,
            dims: config.dims,
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
impl Embedder for HfEmbedder {
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        let url = format!(
            "{}/pipeline/feature-extraction/{}",
            self.base_url, self.model
        );
        let body = serde_json::json!({ "inputs": texts });

        let json = post_json_with_retry(
            &self.client,
            &url,
            self.token.as_deref(),
            &body,
            self.max_retries,
            "hf",
        )
        .await?;

        let rows = json
            .as_array()
            .ok_or_else(|| ProviderError::new("hf", "expected a JSON array of embeddings"))?;

        if rows.len() != texts.len() {
            return Err(ProviderError::new(
                "hf",
                format!("asked for {} embeddings, got {}", texts.len(), rows.len()),
            ));
        }

        rows.iter()
            .map(|row| parse_vector(row, self.dims, "hf"))
            .collect()
    }
}

// ============ OpenAI provider ============

/// Embedding provider using the OpenAI `POST /v1/embeddings` endpoint.
///
/// Requires the `OPENAI_API_KEY` environment variable.
pub struct OpenAiEmbedder {
    model: String,
    dims: usize,
    base_url: String,
    api_key: String,
    max_retries: u32,
    client: reqwest::Client,
}

const OPENAI_DEFAULT_BASE_URL: &str = "https://api.openai.com";

impl OpenAiEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required for openai provider"))?;

        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model,
            dims: config.dims,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| OPENAI_DEFAULT_BASE_URL.to_string()),
            api_key,
            max_retries: config.max_retries,
            client,
        })
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        let url = format!("{}/v1/embeddings", self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let json = post_json_with_retry(
            &self.client,
            &url,
            Some(&self.api_key),
            &body,
            self.max_retries,
            "openai",
        )
        .await?;

        let data = json
            .get("data")
            .and_then(|d| d.as_array())
            .ok_or_else(|| ProviderError::new("openai", "response missing data array"))?;

        if data.len() != texts.len() {
            return Err(ProviderError::new(
                "openai",
                format!("asked for {} embeddings, got {}", texts.len(), data.len()),
            ));
        }

        data.iter()
            .map(|item| {
                let embedding = item
                    .get("embedding")
                    .ok_or_else(|| ProviderError::new("openai", "response item missing embedding"))?;
                parse_vector(embedding, self.dims, "openai")
            })
            .collect()
    }
}

// ============ Shared request plumbing ============

/// POST a JSON body with the retry contract described in the module docs.
/// Returns the parsed response JSON on success.
pub(crate) async fn post_json_with_retry(
    client: &reqwest::Client,
    url: &str,
    bearer_token: Option<&str>,
    body: &serde_json::Value,
    max_retries: u32,
    provider: &'static str,
) -> Result<serde_json::Value, ProviderError> {
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            // Exponential backoff: 1s, 2s, 4s, 8s, ...
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tokio::time::sleep(delay).await;
        }

        let mut request = client.post(url).json(body);
        if let Some(token) = bearer_token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        match request.send().await {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    return response.json().await.map_err(|e| {
                        ProviderError::new(provider, format!("invalid JSON response: {}", e))
                    });
                }

                let body_text = response.text().await.unwrap_or_default();

                // Rate limited or server error — retry
                if status.as_u16() == 429 || status.is_server_error() {
                    tracing::warn!(provider, %status, attempt, "provider request failed, retrying");
                    last_err = Some(ProviderError::new(
                        provider,
                        format!("HTTP {}: {}", status, body_text),
                    ));
                    continue;
                }

                // Client error (not 429) — don't retry
                return Err(ProviderError::new(
                    provider,
                    format!("HTTP {}: {}", status, body_text),
                ));
            }
            Err(e) => {
                last_err = Some(ProviderError::new(provider, e.to_string()));
                continue;
            }
        }
    }

    Err(last_err
        .unwrap_or_else(|| ProviderError::new(provider, "request failed after retries")))
}

/// Parse a JSON array of numbers into a unit-normalized vector of the
/// expected dimensionality.
fn parse_vector(
    value: &serde_json::Value,
    dims: usize,
    provider: &'static str,
) -> Result<Vec<f32>, ProviderError> {
    let array = value
        .as_array()
        .ok_or_else(|| ProviderError::new(provider, "embedding is not a number array"))?;

    let mut vec: Vec<f32> = array
        .iter()
        .map(|v| v.as_f64().unwrap_or(0.0) as f32)
        .collect();

    if vec.len() != dims {
        return Err(ProviderError::new(
            provider,
            format!("expected {}-dimensional embedding, got {}", dims, vec.len()),
        ));
    }

    l2_normalize(&mut vec);
    Ok(vec)
}
