//! Text generation capability.
//!
//! A single [`Generator`] trait covers every place the system asks a model
//! to write prose or SQL. The shipped implementation speaks the
//! OpenAI-compatible chat completions protocol, which also covers local
//! gateways that expose the same surface.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::time::Duration;

use crate::config::GenerationConfig;

/// Produces a completion for a system/user prompt pair.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String>;
}

/// Instantiate the configured generation backend.
pub fn create_generator(config: &GenerationConfig) -> Result<Box<dyn Generator>> {
    Ok(Box::new(OpenAiGenerator::new(config)?))
}

/// Chat-completions client for OpenAI-compatible endpoints.
pub struct OpenAiGenerator {
    model: String,
    url: String,
    api_key: Option<String>,
    max_tokens: u32,
    temperature: f32,
    timeout: Duration,
}

impl OpenAiGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").ok();

        // Local gateways often run unauthenticated; the hosted API never does.
        if api_key.is_none() && config.url.contains("api.openai.com") {
            bail!("OPENAI_API_KEY environment variable not set");
        }

        Ok(Self {
            model: config.model.clone(),
            url: config.url.trim_end_matches('/').to_string(),
            api_key,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }
}

#[async_trait]
impl Generator for OpenAiGenerator {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let client = reqwest::Client::builder().timeout(self.timeout).build()?;
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user }
            ],
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
        });

        let mut request = client
            .post(format!("{}/chat/completions", self.url))
            .header("Content-Type", "application/json")
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request.send().await.context("completion request failed")?;
        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("completion API error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        extract_completion(&json)
    }
}

fn extract_completion(json: &serde_json::Value) -> Result<String> {
    json.get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|s| s.as_str())
        .map(|s| s.trim().to_string())
        .ok_or_else(|| anyhow::anyhow!("Invalid completion response: missing choices"))
}
