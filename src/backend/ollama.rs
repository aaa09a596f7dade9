//! Local Ollama backend
//!
//! Talks to an on-host Ollama server over its native HTTP API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::OllamaSettings;
use crate::error::{Error, Result};
use crate::types::{ConversationTurn, ModelKind};

use super::traits::non_empty;
use super::{BackendHealth, GenerationBackend, GenerationRequest};

const BACKEND: &str = "ollama";

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    num_predict: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    name: String,
}

/// Backend for models served by a local Ollama instance
pub struct OllamaBackend {
    host: String,
    client: Client,
}

impl OllamaBackend {
    pub fn new(settings: &OllamaSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| Error::backend_unavailable(BACKEND, e.to_string()))?;

        let host = settings.host.trim_end_matches('/').to_string();
        info!(host = %host, "Ollama backend created");

        Ok(Self { host, client })
    }

    /// Flatten history and the new message into a single completion prompt
    fn build_prompt(prompt: &str, history: &[ConversationTurn]) -> String {
        let mut out = String::new();

        if !history.is_empty() {
            out.push_str("Previous conversation:\n");
            for turn in history {
                out.push_str(&format!("User: {}\n", turn.user));
                out.push_str(&format!("Assistant: {}\n", turn.assistant));
            }
            out.push('\n');
        }

        out.push_str(&format!("User: {}\nAssistant:", prompt));
        out
    }
}

#[async_trait]
impl GenerationBackend for OllamaBackend {
    fn name(&self) -> &'static str {
        BACKEND
    }

    fn kind(&self) -> ModelKind {
        ModelKind::Local
    }

    async fn health_check(&self) -> Result<BackendHealth> {
        match self.client.get(format!("{}/api/tags", self.host)).send().await {
            Ok(resp) if resp.status().is_success() => Ok(BackendHealth::ok()),
            Ok(resp) => Ok(BackendHealth::down(format!(
                "Ollama returned status {}",
                resp.status()
            ))),
            Err(e) => Ok(BackendHealth::down(format!("Connection failed: {}", e))),
        }
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.host))
            .send()
            .await
            .map_err(|e| Error::backend_unavailable(BACKEND, e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::backend_response(
                BACKEND,
                format!("tags request returned {}", response.status()),
            ));
        }

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| Error::backend_response(BACKEND, e.to_string()))?;

        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    async fn generate(&self, request: GenerationRequest) -> Result<Option<String>> {
        let body = GenerateRequest {
            model: &request.model,
            prompt: Self::build_prompt(&request.prompt, &request.history),
            stream: false,
            options: GenerateOptions {
                num_predict: request.max_tokens,
                temperature: request.temperature,
            },
        };

        debug!(model = %request.model, "Sending local generate request");

        let response = self
            .client
            .post(format!("{}/api/generate", self.host))
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::backend_request(BACKEND, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::backend_response(
                BACKEND,
                format!("generate returned {}: {}", status, text),
            ));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| Error::backend_response(BACKEND, e.to_string()))?;

        Ok(non_empty(parsed.response))
    }
}
