//! Completion providers for component drafting.
//!
//! A provider turns one prompt into one free-text reply. The generator
//! makes a single call per request and never retries; any transport or
//! API failure surfaces as an error for the caller to report.
//!
//! # Providers
//!
//! - **[`DisabledProvider`]**: always fails. Used when `llm.provider = "disabled"`.
//! - **[`OpenAiProvider`]**: blocking call to an OpenAI-compatible
//!   `/chat/completions` endpoint.
//!
//! The API key is read from the environment variable named by
//! `llm.api_key_env` when the provider is constructed.

use anyhow::{bail, Context, Result};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::LlmConfig;

const SYSTEM_PROMPT: &str = "You are a construction cost estimator. \
Reply with a single JSON object describing one priced budget component.";

/// Request envelope handed to every provider.
#[derive(Debug, Clone)]
pub struct CompletionRequest<'a> {
    pub prompt: &'a str,
    pub temperature: f32,
    pub max_tokens: usize,
}

/// A chat-completion backend.
pub trait CompletionProvider: Send + Sync {
    /// Model identifier, for logging.
    fn model_name(&self) -> &str;

    /// Send `request` and return the raw reply text.
    fn complete(&self, request: &CompletionRequest<'_>) -> Result<String>;
}

/// Always refuses; generation fails cleanly without network access.
pub struct DisabledProvider;

impl CompletionProvider for DisabledProvider {
    fn model_name(&self) -> &str {
        "disabled"
    }

    fn complete(&self, _request: &CompletionRequest<'_>) -> Result<String> {
        bail!("completion provider is disabled (set llm.provider in the config)")
    }
}

// ============ OpenAI Provider ============

pub struct OpenAiProvider {
    api_key: String,
    model: String,
    endpoint: String,
    client: Client,
}

impl OpenAiProvider {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .with_context(|| format!("{} not set", config.api_key_env))?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build completion HTTP client")?;
        Ok(Self {
            api_key,
            model: config.model.clone(),
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            client,
        })
    }
}

impl CompletionProvider for OpenAiProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn complete(&self, request: &CompletionRequest<'_>) -> Result<String> {
        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", self.api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth).context("invalid API key")?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let body = ChatRequest {
            model: &self.model,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: request.prompt,
                },
            ],
        };

        let resp = self
            .client
            .post(&self.endpoint)
            .headers(headers)
            .json(&body)
            .send()
            .context("failed to call chat completions")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp
                .text()
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            bail!("completion API returned {}: {}", status, text);
        }

        let parsed: ChatResponse = resp.json().context("failed to parse completion response")?;
        Ok(parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default())
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: usize,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: Option<String>,
}

/// Build the provider named by `config.provider`.
pub fn create_provider(config: &LlmConfig) -> Result<Box<dyn CompletionProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledProvider)),
        "openai" => Ok(Box::new(OpenAiProvider::new(config)?)),
        other => bail!("Unknown completion provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_provider_fails() {
        let provider = create_provider(&LlmConfig::default()).unwrap();
        assert_eq!(provider.model_name(), "disabled");
        let request = CompletionRequest {
            prompt: "x",
            temperature: 0.1,
            max_tokens: 10,
        };
        assert!(provider.complete(&request).is_err());
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let config = LlmConfig {
            provider: "carrier-pigeon".to_string(),
            ..LlmConfig::default()
        };
        assert!(create_provider(&config).is_err());
    }

    #[test]
    fn test_openai_requires_key() {
        let config = LlmConfig {
            provider: "openai".to_string(),
            api_key_env: "BUDGET_HARNESS_TEST_UNSET_KEY".to_string(),
            ..LlmConfig::default()
        };
        assert!(create_provider(&config).is_err());
    }

    #[test]
    fn test_chat_response_parses_null_content() {
        let parsed: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":null}}]}"#).unwrap();
        assert!(parsed.choices[0].message.content.is_none());
    }
}
