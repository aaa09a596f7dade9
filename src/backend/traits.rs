//! Backend trait definitions
//!
//! Defines the GenerationBackend trait implemented by the local and
//! remote model servers.

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;
use crate::types::{ConversationTurn, ModelKind};

// ─────────────────────────────────────────────────────────────────
// Backend Health
// ─────────────────────────────────────────────────────────────────

/// Health status of a backend
#[derive(Debug, Clone, Serialize)]
pub struct BackendHealth {
    /// Whether the backend answered its probe
    pub operational: bool,

    /// Probe failure, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BackendHealth {
    pub fn ok() -> Self {
        Self {
            operational: true,
            error: None,
        }
    }

    pub fn down(error: impl Into<String>) -> Self {
        Self {
            operational: false,
            error: Some(error.into()),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Generation Request
// ─────────────────────────────────────────────────────────────────

/// A single generation call
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Bare model name
    pub model: String,

    /// The new user message
    pub prompt: String,

    /// Recent turns, already trimmed to the history window
    pub history: Vec<ConversationTurn>,

    /// System message for chat-style backends
    pub system_prompt: Option<String>,

    /// Token cap for the completion
    pub max_tokens: u32,

    pub temperature: f32,
}

impl GenerationRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            history: Vec::new(),
            system_prompt: None,
            max_tokens: 1000,
            temperature: 0.7,
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// GenerationBackend Trait
// ─────────────────────────────────────────────────────────────────

/// Core trait for model backends
///
/// The trait is object-safe so backends can be swapped behind `Arc<dyn ...>`.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Backend name (e.g., "ollama", "openai")
    fn name(&self) -> &'static str;

    /// Where the backend's models run
    fn kind(&self) -> ModelKind;

    /// Probe the backend
    async fn health_check(&self) -> Result<BackendHealth>;

    /// Models the backend can serve right now
    async fn list_models(&self) -> Result<Vec<String>>;

    /// Generate a completion
    ///
    /// `Ok(None)` means the backend answered but produced no text.
    async fn generate(&self, request: GenerationRequest) -> Result<Option<String>>;
}

/// Treat blank output as no output
pub(crate) fn non_empty(text: Option<String>) -> Option<String> {
    text.filter(|t| !t.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_empty() {
        assert_eq!(non_empty(Some("hi".to_string())), Some("hi".to_string()));
        assert_eq!(non_empty(Some("  \n".to_string())), None);
        assert_eq!(non_empty(None), None);
    }

    #[test]
    fn test_request_defaults() {
        let req = GenerationRequest::new("llama3.1:8b", "hello");
        assert!(req.history.is_empty());
        assert!(req.system_prompt.is_none());
        assert_eq!(req.max_tokens, 1000);
    }
}
