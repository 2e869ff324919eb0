// src/llm/mod.rs

use anyhow::{anyhow, bail, Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://api.fireworks.ai/inference/v1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Client for an OpenAI-compatible chat-completions endpoint.
pub struct LlmClient {
    pub model: String,
    api_key: String,
    base_url: String,
    pub temperature: f32,
    client: Client,
}

impl LlmClient {
    pub fn new(
        base_url: &str,
        model: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("building HTTP client")?;
        Ok(Self {
            model: model.into(),
            api_key: api_key.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
            temperature: 0.0,
            client,
        })
    }

    /// One completion; returns the first choice's content (empty when the model sent null).
    pub async fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
        });

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("POST {}", url))?;

        let status = resp.status();
        if !status.is_success() {
            let error_text = resp.text().await.unwrap_or_default();
            bail!("chat API error (status {}): {}", status, error_text);
        }

        let json: Value = resp.json().await.context("decoding chat response")?;
        let content = json
            .pointer("/choices/0/message/content")
            .ok_or_else(|| anyhow!("chat response missing choices[0].message"))?;
        let text = content.as_str().unwrap_or_default().to_string();
        debug!(model = %self.model, chars = text.len(), "chat completion");
        Ok(text)
    }
}
