//! Embedding capability and provider implementations.
//!
//! Defines the [`Embedder`] trait the index builder and retrieval engine
//! depend on, plus two remote providers:
//! - **[`OpenAiEmbedder`]**: `POST /v1/embeddings` with batching, retry,
//!   and exponential backoff.
//! - **[`OllamaEmbedder`]**: a local Ollama instance's `/api/embed`.
//!
//! Retry applies to the embedding providers only (they run during the
//! startup-time index build): HTTP 429 and 5xx retry with backoff capped at
//! 2^5 seconds; other 4xx fail immediately; network errors retry.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::time::Duration;

use crate::config::EmbeddingConfig;

/// Computes embedding vectors for batches of text.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;

    /// Embed a batch; one vector per input, in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single query text.
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("empty embedding response"))
    }
}

/// Instantiate the configured embedding provider.
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Box<dyn Embedder>> {
    match config.provider.as_str() {
        "openai" => Ok(Box::new(OpenAiEmbedder::new(config)?)),
        "ollama" => Ok(Box::new(OllamaEmbedder::new(config)?)),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

/// Retry a request closure with the shared backoff schedule.
async fn with_backoff<F, Fut>(max_retries: u32, mut call: F) -> Result<Vec<Vec<f32>>>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = std::result::Result<Vec<Vec<f32>>, RequestOutcome>>,
{
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            // Exponential backoff: 1s, 2s, 4s, 8s, ...
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tokio::time::sleep(delay).await;
        }

        match call().await {
            Ok(vectors) => return Ok(vectors),
            Err(RequestOutcome::Retryable(e)) => {
                last_err = Some(e);
                continue;
            }
            Err(RequestOutcome::Fatal(e)) => return Err(e),
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("embedding failed after retries")))
}

enum RequestOutcome {
    Retryable(anyhow::Error),
    Fatal(anyhow::Error),
}

// ============ OpenAI ============

/// Embedding provider using the OpenAI API. Requires `OPENAI_API_KEY`.
pub struct OpenAiEmbedder {
    model: String,
    api_key: String,
    max_retries: u32,
    timeout: Duration,
}

impl OpenAiEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required for OpenAI provider"))?;
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;

        Ok(Self {
            model,
            api_key,
            max_retries: config.max_retries,
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let client = reqwest::Client::builder().timeout(self.timeout).build()?;
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        with_backoff(self.max_retries, || {
            let client = client.clone();
            let body = body.clone();
            let api_key = self.api_key.clone();
            async move {
                let resp = client
                    .post("https://api.openai.com/v1/embeddings")
                    .header("Authorization", format!("Bearer {}", api_key))
                    .header("Content-Type", "application/json")
                    .json(&body)
                    .send()
                    .await;

                let response = match resp {
                    Ok(r) => r,
                    Err(e) => return Err(RequestOutcome::Retryable(e.into())),
                };

                let status = response.status();
                if status.is_success() {
                    let json: serde_json::Value = response
                        .json()
                        .await
                        .map_err(|e| RequestOutcome::Fatal(e.into()))?;
                    return parse_openai_embeddings(&json).map_err(RequestOutcome::Fatal);
                }

                let body_text = response.text().await.unwrap_or_default();
                let err = anyhow::anyhow!("OpenAI API error {}: {}", status, body_text);
                if status.as_u16() == 429 || status.is_server_error() {
                    Err(RequestOutcome::Retryable(err))
                } else {
                    Err(RequestOutcome::Fatal(err))
                }
            }
        })
        .await
    }
}

fn parse_openai_embeddings(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing data array"))?;

    let mut embeddings = Vec::with_capacity(data.len());
    for item in data {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing embedding"))?;
        embeddings.push(
            embedding
                .iter()
                .map(|v| v.as_f64().unwrap_or(0.0) as f32)
                .collect(),
        );
    }
    Ok(embeddings)
}

// ============ Ollama ============

/// Embedding provider using a local Ollama instance's `/api/embed`.
pub struct OllamaEmbedder {
    model: String,
    url: String,
    max_retries: u32,
    timeout: Duration,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required for Ollama provider"))?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| "http://localhost:11434".to_string());

        Ok(Self {
            model,
            url,
            max_retries: config.max_retries,
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let client = reqwest::Client::builder().timeout(self.timeout).build()?;
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });
        let endpoint = format!("{}/api/embed", self.url);

        with_backoff(self.max_retries, || {
            let client = client.clone();
            let body = body.clone();
            let endpoint = endpoint.clone();
            let url = self.url.clone();
            async move {
                let resp = client
                    .post(&endpoint)
                    .header("Content-Type", "application/json")
                    .json(&body)
                    .send()
                    .await;

                let response = match resp {
                    Ok(r) => r,
                    Err(e) => {
                        return Err(RequestOutcome::Retryable(anyhow::anyhow!(
                            "Ollama connection error (is Ollama running at {}?): {}",
                            url,
                            e
                        )))
                    }
                };

                let status = response.status();
                if status.is_success() {
                    let json: serde_json::Value = response
                        .json()
                        .await
                        .map_err(|e| RequestOutcome::Fatal(e.into()))?;
                    return parse_ollama_embeddings(&json).map_err(RequestOutcome::Fatal);
                }

                let body_text = response.text().await.unwrap_or_default();
                let err = anyhow::anyhow!("Ollama API error {}: {}", status, body_text);
                if status.as_u16() == 429 || status.is_server_error() {
                    Err(RequestOutcome::Retryable(err))
                } else {
                    Err(RequestOutcome::Fatal(err))
                }
            }
        })
        .await
    }
}

fn parse_ollama_embeddings(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: missing embeddings array"))?;

    let mut result = Vec::with_capacity(embeddings.len());
    for embedding in embeddings {
        let vec: Vec<f32> = embedding
            .as_array()
            .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: embedding is not an array"))?
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();
        result.push(vec);
    }
    Ok(result)
}

// ============ Vector math ============

/// Cosine similarity in `[-1.0, 1.0]`; `0.0` for empty or mismatched lengths.
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
