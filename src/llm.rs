//! OpenAI-compatible chat completion client.
//!
//! [`ChatClient`] implements [`ModelClient`] against
//! `POST {base_url}/chat/completions`. The default endpoint is Groq's
//! OpenAI-compatible API; any server speaking the same protocol works.
//!
//! One call is one HTTP request. Retries, backoff and degradation belong to
//! the analysis loop in [`crate::analyze`].
//!
//! # Content extraction
//!
//! The reply text is read from the first choice, in order of preference:
//!
//! 1. `choices[0].message.content`
//! 2. `choices[0].text`
//! 3. top-level `text`
//!
//! A reply with none of these (or only blank ones) is
//! [`ModelError::EmptyContent`].

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use clause_audit_core::error::ModelError;
use clause_audit_core::model::{ModelClient, SYSTEM_PROMPT};
use clause_audit_core::models::ModelParams;

use crate::config::LlmConfig;

/// Chat-completions client bound to one endpoint and model.
pub struct ChatClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    api_key_env: String,
}

impl ChatClient {
    /// Build a client from configuration, reading the API key from the
    /// environment variable named by `llm.api_key_env`.
    ///
    /// A missing key is not an error here: every call then fails with
    /// [`ModelError::Config`], which the analysis loop turns into degraded
    /// results.
    pub fn from_config(config: &LlmConfig) -> Self {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty());
        Self::new(
            &config.base_url,
            &config.model,
            api_key,
            &config.api_key_env,
        )
    }

    pub fn new(base_url: &str, model: &str, api_key: Option<String>, api_key_env: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key,
            api_key_env: api_key_env.to_string(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl ModelClient for ChatClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str, params: &ModelParams) -> Result<String, ModelError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ModelError::Config(format!("{} not set", self.api_key_env)))?;

        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": prompt },
            ],
            "temperature": params.temperature,
            "max_tokens": params.max_tokens,
        });

        let resp = self
            .http
            .post(self.endpoint())
            .bearer_auth(api_key)
            .timeout(Duration::from_secs(params.timeout_secs))
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(e, params.timeout_secs))?;

        let status = resp.status();
        if !status.is_success() {
            let body_text = resp.text().await.unwrap_or_default();
            return Err(ModelError::Status {
                status: status.as_u16(),
                body: body_text,
            });
        }

        let json: Value = resp
            .json()
            .await
            .map_err(|e| transport_error(e, params.timeout_secs))?;

        extract_content(&json).ok_or(ModelError::EmptyContent)
    }
}

fn transport_error(err: reqwest::Error, timeout_secs: u64) -> ModelError {
    if err.is_timeout() {
        ModelError::Timeout(timeout_secs)
    } else {
        ModelError::Transport(err.to_string())
    }
}

/// Pull the reply text out of a chat-completions response body.
pub fn extract_content(json: &Value) -> Option<String> {
    let choice = json.get("choices").and_then(|c| c.get(0));

    let candidates = [
        choice
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content")),
        choice.and_then(|c| c.get("text")),
        json.get("text"),
    ];

    candidates
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .find(|s| !s.trim().is_empty())
        .map(str::to_string)
}
