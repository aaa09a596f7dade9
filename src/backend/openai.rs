//! OpenAI-compatible API backend
//!
//! Remote chat completions against any OpenAI-compatible endpoint.
//! Requests are sent once; there is no retry loop.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::OpenAiSettings;
use crate::error::{Error, Result};
use crate::types::ModelKind;

use super::traits::non_empty;
use super::{BackendHealth, GenerationBackend, GenerationRequest};

const BACKEND: &str = "openai";

// ─────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────

/// Configuration for the OpenAI-compatible backend
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// API base URL (e.g., "https://api.openai.com/v1")
    pub base_url: String,

    pub api_key: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl From<&OpenAiSettings> for OpenAiConfig {
    fn from(settings: &OpenAiSettings) -> Self {
        Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
            timeout_secs: settings.timeout_secs,
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// OpenAI API types (request/response)
// ─────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

// ─────────────────────────────────────────────────────────────────
// OpenAI Backend
// ─────────────────────────────────────────────────────────────────

/// Remote backend for hosted chat models
pub struct OpenAiBackend {
    config: OpenAiConfig,
    client: Client,
}

impl OpenAiBackend {
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::backend_unavailable(BACKEND, e.to_string()))?;

        info!(base_url = %config.base_url, "OpenAI-compatible backend created");

        Ok(Self { config, client })
    }

    /// Build the authorization header value (if API key is set)
    fn auth_header(&self) -> Option<String> {
        if self.config.api_key.is_empty() {
            None
        } else {
            Some(format!("Bearer {}", self.config.api_key))
        }
    }

    /// System message, history pairs, then the new user message
    fn build_messages(request: &GenerationRequest) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(request.history.len() * 2 + 2);
        if let Some(ref system) = request.system_prompt {
            messages.push(ChatMessage {
                role: "system",
                content: system.clone(),
            });
        }
        for turn in &request.history {
            messages.push(ChatMessage {
                role: "user",
                content: turn.user.clone(),
            });
            messages.push(ChatMessage {
                role: "assistant",
                content: turn.assistant.clone(),
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: request.prompt.clone(),
        });
        messages
    }
}

#[async_trait]
impl GenerationBackend for OpenAiBackend {
    fn name(&self) -> &'static str {
        BACKEND
    }

    fn kind(&self) -> ModelKind {
        ModelKind::Remote
    }

    async fn health_check(&self) -> Result<BackendHealth> {
        let url = format!("{}/models", self.config.base_url);
        let mut req = self.client.get(&url);
        if let Some(ref auth) = self.auth_header() {
            req = req.header("Authorization", auth);
        }

        match req.send().await {
            Ok(resp) if resp.status().is_success() => Ok(BackendHealth::ok()),
            Ok(resp) => Ok(BackendHealth::down(format!(
                "API returned status {}",
                resp.status()
            ))),
            Err(e) => Ok(BackendHealth::down(format!("Connection failed: {}", e))),
        }
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/models", self.config.base_url);
        let mut req = self.client.get(&url);
        if let Some(ref auth) = self.auth_header() {
            req = req.header("Authorization", auth);
        }

        let response = req
            .send()
            .await
            .map_err(|e| Error::backend_request(BACKEND, e.to_string()))?;
        if !response.status().is_success() {
            return Err(Error::backend_response(
                BACKEND,
                format!("API returned status {}", response.status()),
            ));
        }

        let list: ModelList = response
            .json()
            .await
            .map_err(|e| Error::backend_response(BACKEND, e.to_string()))?;
        Ok(list.data.into_iter().map(|m| m.id).collect())
    }

    async fn generate(&self, request: GenerationRequest) -> Result<Option<String>> {
        let body = ChatCompletionRequest {
            model: request.model.clone(),
            messages: Self::build_messages(&request),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let url = format!("{}/chat/completions", self.config.base_url);
        let mut req = self.client.post(&url).json(&body);
        if let Some(ref auth) = self.auth_header() {
            req = req.header("Authorization", auth);
        }

        debug!(model = %request.model, messages = body.messages.len(), "Sending chat completion");

        let response = req
            .send()
            .await
            .map_err(|e| Error::backend_request(BACKEND, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::backend_response(
                BACKEND,
                format!("API error {}: {}", status, text),
            ));
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| Error::backend_response(BACKEND, format!("Failed to parse API response: {}", e)))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content);

        Ok(non_empty(content))
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
