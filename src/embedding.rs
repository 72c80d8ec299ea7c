//! Embedding and completion provider boundary.
//!
//! Defines the [`EmbeddingClient`] and [`CompletionClient`] traits plus the
//! OpenAI-compatible HTTP implementations. Providers make exactly **one**
//! attempt per call: pacing, retry, and backoff are owned by the batch engine,
//! which classifies failures by message signature (see
//! [`RagError::is_throttle`](crate::errors::RagError::is_throttle)).
//!
//! Also provides [`cosine_similarity`] for nearest-neighbor scoring.
//!
//! # Provider selection
//!
//! | config value | implementation |
//! |--------------|----------------|
//! | `"disabled"` | [`DisabledClient`] — every call errors |
//! | `"openai"` | [`OpenAiEmbeddings`] / [`OpenAiCompletions`] |

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::{CompletionConfig, EmbeddingConfig};
use crate::errors::RagError;

const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// Embeds batches of chunk texts.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;

    /// One vector per input text, in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError>;
}

/// Synthesizes a natural-language answer from a stuffed prompt.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    fn model_name(&self) -> &str;

    async fn complete(&self, prompt: &str) -> Result<String, RagError>;
}

// ============ Disabled provider ============

/// Placeholder used when a provider is not configured. Every call errors.
pub struct DisabledClient;

#[async_trait]
impl EmbeddingClient for DisabledClient {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        Err(RagError::Provider("embedding provider is disabled".to_string()))
    }
}

#[async_trait]
impl CompletionClient for DisabledClient {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn complete(&self, _prompt: &str) -> Result<String, RagError> {
        Err(RagError::Provider("completion provider is disabled".to_string()))
    }
}

// ============ OpenAI-compatible embeddings ============

/// Calls `POST {base}/v1/embeddings` on an OpenAI-compatible endpoint.
///
/// Requires `OPENAI_API_KEY` in the environment. The base URL may be
/// overridden in config for gateway deployments.
pub struct OpenAiEmbeddings {
    model: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiEmbeddings {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, RagError> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| RagError::Config("embedding.model required for openai provider".to_string()))?;
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| RagError::Config("OPENAI_API_KEY environment variable not set".to_string()))?;
        let base_url = config
            .url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model,
            base_url,
            api_key,
            client,
        })
    }
}

#[async_trait]
impl EmbeddingClient for OpenAiEmbeddings {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let response = self
            .client
            .post(format!("{}/v1/embeddings", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(RagError::Provider(format!(
                "embeddings API error {}: {}",
                status, body_text
            )));
        }

        let json: serde_json::Value = response.json().await?;
        parse_embeddings_response(&json)
    }
}

/// Extract the `data[].embedding` arrays, in input order.
fn parse_embeddings_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>, RagError> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| RagError::Provider("invalid embeddings response: missing data array".to_string()))?;

    let mut embeddings = Vec::with_capacity(data.len());
    for item in data {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| RagError::Provider("invalid embeddings response: missing embedding".to_string()))?;
        let vec: Vec<f32> = embedding
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();
        embeddings.push(vec);
    }

    Ok(embeddings)
}

// ============ OpenAI-compatible completions ============

/// Calls `POST {base}/v1/chat/completions` on an OpenAI-compatible endpoint.
pub struct OpenAiCompletions {
    model: String,
    base_url: String,
    api_key: String,
    temperature: f64,
    client: reqwest::Client,
}

impl OpenAiCompletions {
    pub fn new(config: &CompletionConfig) -> Result<Self, RagError> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| RagError::Config("completion.model required for openai provider".to_string()))?;
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| RagError::Config("OPENAI_API_KEY environment variable not set".to_string()))?;
        let base_url = config
            .url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model,
            base_url,
            api_key,
            temperature: config.temperature,
            client,
        })
    }
}

#[async_trait]
impl CompletionClient for OpenAiCompletions {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String, RagError> {
        let body = serde_json::json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": [{"role": "user", "content": prompt}],
        });

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(RagError::Provider(format!(
                "completions API error {}: {}",
                status, body_text
            )));
        }

        let json: serde_json::Value = response.json().await?;
        json.get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| RagError::Provider("invalid completions response: missing message content".to_string()))
    }
}

// ============ Factories ============

/// Instantiate the embedding client named by configuration.
pub fn create_embedding_client(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingClient>, RagError> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledClient)),
        "openai" => Ok(Arc::new(OpenAiEmbeddings::new(config)?)),
        other => Err(RagError::Config(format!("unknown embedding provider: {}", other))),
    }
}

/// Instantiate the completion client named by configuration.
pub fn create_completion_client(config: &CompletionConfig) -> Result<Arc<dyn CompletionClient>, RagError> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledClient)),
        "openai" => Ok(Arc::new(OpenAiCompletions::new(config)?)),
        other => Err(RagError::Config(format!("unknown completion provider: {}", other))),
    }
}

// ============ Vector utilities ============

/// Cosine similarity in `[-1.0, 1.0]`; `0.0` for empty or mismatched vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}
