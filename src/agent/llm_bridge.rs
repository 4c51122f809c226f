// TubeForge LLM Gateway Bridge
// Copyright (c) 2026 Xing_The_Creator | TubeForge

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::LlmConfig;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("LLM gateway is not configured")]
    NotConfigured,

    #[error("LLM request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("LLM gateway returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("LLM returned an empty response")]
    EmptyResponse,

    #[error("LLM response did not contain valid JSON: {0}")]
    MalformedJson(String),
}

/// A chat-completion backend. Callers treat every error as "use the fallback".
#[async_trait]
pub trait LanguageModel: Send + Sync {
    fn model_name(&self) -> &str;

    async fn complete(&self, system_prompt: &str, user_message: &str) -> Result<String, LlmError>;
}

/// OpenAI-compatible client pointed at OpenRouter.
pub struct OpenRouterClient {
    client: reqwest::Client,
    config: LlmConfig,
}

impl OpenRouterClient {
    pub fn new(config: LlmConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|e| {
                warn!("[LLM] Falling back to default HTTP client: {}", e);
                reqwest::Client::new()
            });
        Self { client, config }
    }

    pub fn is_configured(&self) -> bool {
        self.config.api_key.is_some()
    }
}

#[async_trait]
impl LanguageModel for OpenRouterClient {
    fn model_name(&self) -> &str {
        &self.config.model
    }

    async fn complete(&self, system_prompt: &str, user_message: &str) -> Result<String, LlmError> {
        let key = self.config.api_key.as_deref().ok_or(LlmError::NotConfigured)?;

        let payload = json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": system_prompt },
                { "role": "user", "content": user_message }
            ],
            "max_tokens": 1000,
            "temperature": 0.7
        });

        let endpoint = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        debug!("[LLM] POST {} ({})", endpoint, self.config.model);

        let resp = self
            .client
            .post(&endpoint)
            .bearer_auth(key)
            .header("HTTP-Referer", &self.config.referer)
            .header("X-Title", &self.config.app_title)
            .json(&payload)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!("[LLM] Gateway error {}: {}", status, body);
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: Value = resp.json().await?;
        let content = body["choices"][0]["message"]["content"]
            .as_str()
            .map(str::trim)
            .unwrap_or_default();

        if content.is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        info!("[LLM] 🧠 {} replied ({} chars)", self.config.model, content.len());
        Ok(content.to_string())
    }
}

/// Pull the JSON object out of a reply that may wrap it in prose or code fences.
pub fn extract_json_object(text: &str) -> Result<Value, LlmError> {
    let start = text.find('{');
    let end = text.rfind('}');
    match (start, end) {
        (Some(s), Some(e)) if e > s => serde_json::from_str(&text[s..=e])
            .map_err(|err| LlmError::MalformedJson(err.to_string())),
        _ => Err(LlmError::MalformedJson("no JSON object found".to_string())),
    }
}

pub async fn complete_json(
    llm: &dyn LanguageModel,
    system_prompt: &str,
    user_message: &str,
) -> Result<Value, LlmError> {
    let reply = llm.complete(system_prompt, user_message).await?;
    extract_json_object(&reply)
}
